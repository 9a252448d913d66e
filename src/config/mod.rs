//! 설정 모듈 - 크롤러 / 서버 / 채팅 설정
//!
//! 모든 설정은 `Default` 구현을 가진 일반 구조체이며,
//! CLI 인자(환경변수 포함)로 덮어씁니다. 디스크에 저장되는 상태는 없습니다.

use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// 크롤링 대상 문서 사이트
pub const DEFAULT_BASE_URL: &str = "https://knowledge.eptura.com";

/// 기본 시드 경로 (섹션 단위로 순서대로 크롤링)
pub const DEFAULT_SEED_PATHS: &[&str] = &[
    "/Asset/Modules",
    "/Asset/Getting_Started",
    "/Asset/Administration",
];

/// 링크 탐색 시 허용하는 경로 prefix
pub const DEFAULT_LINK_PREFIXES: &[&str] = &["/Asset"];

/// 차단 방지용 브라우저 User-Agent
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 기본 리스닝 포트
pub const DEFAULT_PORT: u16 = 3001;

/// CORS 허용 origin
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://eptura-frontend-12.vercel.app",
    "http://localhost:5173",
];

/// 기본 채팅 모델
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// OpenAI 호환 API 엔드포인트
pub const DEFAULT_CHAT_BASE_URL: &str = "https://api.openai.com/v1";

/// 전체 재크롤링 주기 (24시간)
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

// ============================================================================
// CrawlConfig
// ============================================================================

/// 크롤러 설정
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// 상대 경로를 절대 URL로 만들 때 사용하는 origin
    pub base_url: String,
    /// 시드 경로 (순서 유지)
    pub seed_paths: Vec<String>,
    /// 링크 탐색 허용 prefix
    pub link_prefixes: Vec<String>,
    /// 최대 깊이 (시드 = 0, 이 값 초과 시 요청 없이 건너뜀)
    pub max_depth: usize,
    /// 페이지당 처리할 최대 링크 수
    pub max_links_per_page: usize,
    /// 문서로 저장하기 위한 최소 본문 길이 (초과해야 저장)
    pub min_content_length: usize,
    /// 요청당 타임아웃
    pub request_timeout: Duration,
    /// 하위 페이지 방문 사이 딜레이
    pub child_delay: Duration,
    /// 시드 섹션 사이 딜레이
    pub section_delay: Duration,
    /// 전체 크롤 타임아웃 (None이면 무제한)
    pub crawl_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            seed_paths: DEFAULT_SEED_PATHS.iter().map(|s| s.to_string()).collect(),
            link_prefixes: DEFAULT_LINK_PREFIXES.iter().map(|s| s.to_string()).collect(),
            max_depth: 3,
            max_links_per_page: 10,
            min_content_length: 50,
            request_timeout: Duration::from_secs(10),
            child_delay: Duration::from_millis(500),
            section_delay: Duration::from_secs(1),
            crawl_timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CrawlConfig {
    /// 딜레이 없는 설정 (테스트 / 로컬 미러용)
    pub fn without_delays(mut self) -> Self {
        self.child_delay = Duration::ZERO;
        self.section_delay = Duration::ZERO;
        self
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

/// HTTP 서버 설정
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub allowed_origins: Vec<String>,
    /// 클라이언트별 윈도우당 최대 요청 수 (0이면 비활성화)
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    /// JSON 요청 본문 최대 크기
    pub body_limit: usize,
    pub refresh_interval: Duration,
    /// 시작 시 오래된 지식베이스 크롤링 여부
    pub initial_crawl: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect(),
            rate_limit_max: 100,
            rate_limit_window: Duration::from_secs(15 * 60),
            body_limit: 10 * 1024 * 1024,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            initial_crawl: true,
        }
    }
}

// ============================================================================
// ChatConfig
// ============================================================================

/// 채팅 모델 설정
#[derive(Clone)]
pub struct ChatConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_CHAT_MODEL.to_string(),
            base_url: DEFAULT_CHAT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            temperature: 0.3,
            max_tokens: 800,
        }
    }
}

impl ChatConfig {
    /// API 키 설정 여부
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false)
    }
}

// API 키는 로그에 남기지 않음
impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
