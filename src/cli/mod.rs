//! CLI 모듈
//!
//! eptura-kb CLI 명령어 정의 및 구현

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::chat::{ChatProvider, OpenAiChat};
use crate::config::{
    ChatConfig, CrawlConfig, ServerConfig, DEFAULT_ALLOWED_ORIGINS, DEFAULT_BASE_URL,
    DEFAULT_CHAT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_PORT,
};
use crate::crawler::CrawlReport;
use crate::knowledge::DEFAULT_SEARCH_LIMIT;
use crate::scheduler::RefreshScheduler;
use crate::scraper::WebScraper;
use crate::server::{self, AppState};
use crate::service::KnowledgeService;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "eptura-kb")]
#[command(version, about = "Eptura 문서 지식베이스 + 채팅 백엔드", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// HTTP 서버 + 주기 갱신 스케줄러 실행
    Serve(ServeArgs),

    /// 한 번 크롤링하고 리포트 출력
    Crawl {
        #[command(flatten)]
        crawl: CrawlArgs,
    },

    /// 크롤링 후 지식베이스 검색
    Search {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 제한
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,

        #[command(flatten)]
        crawl: CrawlArgs,
    },

    /// 단일 URL 추출 결과 확인 (셀렉터 디버깅용)
    Extract {
        /// 추출할 URL
        url: String,
    },
}

/// 크롤 대상 설정
#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    /// 상대 링크 해석 기준 origin
    #[arg(long, env = "KB_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// 시드 경로 (반복 지정, 미지정 시 기본 섹션)
    #[arg(long = "seed")]
    pub seeds: Vec<String>,

    /// 링크 탐색 허용 prefix (반복 지정)
    #[arg(long = "prefix")]
    pub prefixes: Vec<String>,

    /// 최대 크롤 깊이
    #[arg(long, default_value_t = 3)]
    pub max_depth: usize,

    /// 전체 크롤 타임아웃 (초)
    #[arg(long)]
    pub crawl_timeout_secs: Option<u64>,
}

impl CrawlArgs {
    pub fn into_config(self) -> CrawlConfig {
        let mut config = CrawlConfig {
            base_url: self.base_url,
            max_depth: self.max_depth,
            crawl_timeout: self.crawl_timeout_secs.map(Duration::from_secs),
            ..CrawlConfig::default()
        };
        if !self.seeds.is_empty() {
            config.seed_paths = self.seeds;
        }
        if !self.prefixes.is_empty() {
            config.link_prefixes = self.prefixes;
        }
        config
    }
}

/// `serve` 옵션
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// 리스닝 포트
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// OpenAI 호환 API 키 (없으면 채팅 요청은 500)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// 채팅 모델
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    pub model: String,

    /// 채팅 API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_CHAT_BASE_URL)]
    pub openai_base_url: String,

    /// CORS 허용 origin (쉼표 구분)
    #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    #[command(flatten)]
    pub crawl: CrawlArgs,

    /// 전체 재크롤링 주기 (시간)
    #[arg(long, default_value_t = 24)]
    pub refresh_hours: u64,

    /// 시작 시 크롤링 건너뛰기
    #[arg(long)]
    pub no_initial_crawl: bool,
}

impl ServeArgs {
    pub fn server_config(&self) -> Result<ServerConfig> {
        if self.refresh_hours == 0 {
            bail!("--refresh-hours must be at least 1");
        }

        let allowed_origins: Vec<String> = self
            .allowed_origins
            .iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(ServerConfig {
            port: self.port,
            allowed_origins: if allowed_origins.is_empty() {
                DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect()
            } else {
                allowed_origins
            },
            refresh_interval: Duration::from_secs(self.refresh_hours * 60 * 60),
            initial_crawl: !self.no_initial_crawl,
            ..ServerConfig::default()
        })
    }

    pub fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            base_url: self.openai_base_url.clone(),
            ..ChatConfig::default()
        }
    }
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve(args) => cmd_serve(args).await,
        Commands::Crawl { crawl } => cmd_crawl(crawl).await,
        Commands::Search {
            query,
            limit,
            crawl,
        } => cmd_search(&query, limit, crawl).await,
        Commands::Extract { url } => cmd_extract(&url).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn build_service(config: CrawlConfig, refresh_interval: Duration) -> Result<KnowledgeService> {
    let scraper = WebScraper::from_config(&config).context("WebScraper 생성 실패")?;
    KnowledgeService::from_config(config, Arc::new(scraper), refresh_interval)
        .context("KnowledgeService 초기화 실패")
}

/// 서버 명령어 (serve)
///
/// 지식베이스가 비어 있으면 먼저 크롤링한 뒤 서버를 시작합니다.
async fn cmd_serve(args: ServeArgs) -> Result<()> {
    let server_config = args.server_config()?;
    let chat_config = args.chat_config();

    let service = Arc::new(build_service(
        args.crawl.into_config(),
        server_config.refresh_interval,
    )?);

    let scheduler = RefreshScheduler::new(Arc::clone(&service));
    if server_config.initial_crawl {
        // 첫 크롤 실패는 서버 시작을 막지 않음
        match scheduler.ensure_fresh().await {
            Ok(Some(report)) => log_report(&report),
            Ok(None) => {}
            Err(e) => tracing::error!("Initial crawl failed: {:#}", e),
        }
    }
    let _refresh = scheduler.spawn();

    let chat: Option<Arc<dyn ChatProvider>> = if chat_config.has_api_key() {
        let provider = OpenAiChat::new(chat_config).context("채팅 클라이언트 생성 실패")?;
        tracing::info!("Chat provider: {}", provider.name());
        Some(Arc::new(provider))
    } else {
        tracing::warn!("OPENAI_API_KEY is not set, /api/chat will return errors");
        None
    };

    server::serve(AppState::new(service, chat), &server_config).await
}

/// 크롤 명령어 (crawl)
async fn cmd_crawl(crawl: CrawlArgs) -> Result<()> {
    let config = crawl.into_config();
    println!("[*] 크롤링 중: {} ({} 섹션)", config.base_url, config.seed_paths.len());

    let service = build_service(config, crate::config::DEFAULT_REFRESH_INTERVAL)?;
    let report = service.refresh().await.context("크롤링 실패")?;

    print_report(&report);

    let stats = service.store().stats()?;
    println!("     총 콘텐츠: {}", format_bytes(stats.total_content_bytes));

    Ok(())
}

/// 검색 명령어 (search)
///
/// 메모리 저장소이므로 매번 크롤링 후 검색합니다.
async fn cmd_search(query: &str, limit: usize, crawl: CrawlArgs) -> Result<()> {
    let service = build_service(crawl.into_config(), crate::config::DEFAULT_REFRESH_INTERVAL)?;

    println!("[*] 크롤링 중...");
    let report = service.refresh().await.context("크롤링 실패")?;
    println!("[OK] 문서 {} 건 수집", report.documents_stored);

    println!("[*] 검색 중: \"{}\"", query);
    let results = service.search(query, limit).context("검색 실패")?;

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());

    for (i, result) in results.iter().enumerate() {
        println!("{}. [점수: {}] {}", i + 1, result.score, result.document.title);
        println!("   URL: {}", result.document.url);
        println!("   내용: {}", truncate_text(&result.excerpt, 200));
        println!();
    }

    Ok(())
}

/// 추출 명령어 (extract)
async fn cmd_extract(url: &str) -> Result<()> {
    println!("[*] URL 스크래핑 중: {}", url);

    let scraper = WebScraper::from_config(&CrawlConfig::default()).context("WebScraper 생성 실패")?;
    let scraped = scraper.scrape(url).await.context("URL 스크래핑 실패")?;

    println!("[OK] 제목: {}", scraped.title);
    println!(
        "     본문: {} chars ({})",
        scraped.content.chars().count(),
        format_bytes(scraped.content.len())
    );
    println!();
    println!("{}", scraped.content);

    Ok(())
}

fn log_report(report: &CrawlReport) {
    tracing::info!(
        "Crawl finished in {}s: {} visited, {} stored, {} failed, {} skipped",
        (report.finished_at - report.started_at).num_seconds(),
        report.pages_visited,
        report.documents_stored,
        report.pages_failed,
        report.pages_skipped
    );
}

fn print_report(report: &CrawlReport) {
    println!(
        "[OK] 크롤링 완료 ({}s)",
        (report.finished_at - report.started_at).num_seconds()
    );
    println!("     방문: {}", report.pages_visited);
    println!("     저장: {}", report.documents_stored);
    println!("     실패: {}", report.pages_failed);
    println!("     건너뜀: {}", report.pages_skipped);
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
