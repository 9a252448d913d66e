//! 크롤러 모듈 - 깊이 제한 재귀 크롤링
//!
//! 시드 경로마다 명시적 작업 큐 `(URL, depth)`로 사이트 내부 링크를 따라가며
//! 페이지를 추출해 Knowledge Store에 저장합니다.
//!
//! - 방문 집합은 크롤 1회 단위이며 큐에 넣기 전에 확인 (같은 URL 중복 요청 없음)
//! - 페이지 단위 실패는 로그만 남기고 계속 진행
//! - 하위 페이지 사이 / 시드 섹션 사이에 딜레이를 두어 대상 사이트의 rate limit을 피함

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

use crate::config::CrawlConfig;
use crate::extractor::{ContentExtractor, ExtractedPage};
use crate::knowledge::{Document, KnowledgeStore};
use crate::scraper::PageFetcher;

// ============================================================================
// Types
// ============================================================================

/// 크롤 1회 결과 요약
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// 요청을 보낸 페이지 수
    pub pages_visited: usize,
    /// 저장(또는 갱신)된 문서 수
    pub documents_stored: usize,
    /// 요청/저장 실패 수
    pub pages_failed: usize,
    /// 본문이 너무 짧아 버려진 페이지 수
    pub pages_skipped: usize,
}

impl CrawlReport {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            pages_visited: 0,
            documents_stored: 0,
            pages_failed: 0,
            pages_skipped: 0,
        }
    }
}

// ============================================================================
// Crawler
// ============================================================================

/// 문서 사이트 크롤러
pub struct Crawler {
    config: CrawlConfig,
    base: Url,
    fetcher: Arc<dyn PageFetcher>,
    extractor: ContentExtractor,
    store: Arc<KnowledgeStore>,
}

impl Crawler {
    /// 새 크롤러 생성
    ///
    /// # Arguments
    /// * `config` - 크롤 설정 (base_url은 절대 URL이어야 함)
    /// * `fetcher` - 페이지 HTML 공급자
    /// * `store` - 결과를 기록할 저장소
    pub fn new(
        config: CrawlConfig,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<KnowledgeStore>,
    ) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid base URL: {}", config.base_url))?;

        Ok(Self {
            config,
            base,
            fetcher,
            extractor: ContentExtractor::new(),
            store,
        })
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    /// 설정된 시드 경로 전체 크롤
    pub async fn crawl(&self) -> Result<CrawlReport> {
        self.crawl_paths(&self.config.seed_paths).await
    }

    /// 지정한 시드 경로 순서대로 전체 크롤
    ///
    /// 전체 타임아웃이 설정되어 있고 초과하면 남은 시드를 중단하고 에러를 반환합니다.
    /// 이미 저장된 문서는 그대로 유지됩니다.
    pub async fn crawl_paths(&self, seeds: &[String]) -> Result<CrawlReport> {
        match self.config.crawl_timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(seeds))
                .await
                .map_err(|_| anyhow::anyhow!("Crawl timed out after {:?}", limit)),
            None => Ok(self.run(seeds).await),
        }
    }

    async fn run(&self, seeds: &[String]) -> CrawlReport {
        let mut report = CrawlReport::start();
        let mut visited = HashSet::new();

        tracing::info!("Starting crawl of {} ({} sections)", self.base, seeds.len());

        for (i, seed) in seeds.iter().enumerate() {
            if i > 0 && !self.config.section_delay.is_zero() {
                tokio::time::sleep(self.config.section_delay).await;
            }
            tracing::info!("Crawling section: {}", seed);
            self.crawl_section(seed, &mut visited, &mut report).await;
        }

        report.finished_at = Utc::now();
        tracing::info!(
            "Crawl finished: visited={}, stored={}, failed={}, skipped={}",
            report.pages_visited,
            report.documents_stored,
            report.pages_failed,
            report.pages_skipped
        );

        report
    }

    /// 시드 하나에서 시작하는 너비 우선 탐색
    ///
    /// 시드는 이전 섹션에서 방문했더라도 항상 다시 방문합니다.
    async fn crawl_section(
        &self,
        seed: &str,
        visited: &mut HashSet<String>,
        report: &mut CrawlReport,
    ) {
        let Some(seed_url) = self.resolve(seed) else {
            report.pages_failed += 1;
            return;
        };
        visited.insert(seed_url.to_string());

        let mut frontier = VecDeque::from([(seed_url, 0usize)]);
        let mut first = true;

        while let Some((url, depth)) = frontier.pop_front() {
            if !first && !self.config.child_delay.is_zero() {
                tokio::time::sleep(self.config.child_delay).await;
            }
            first = false;

            let links = self.visit(&url, depth, report).await;

            // 깊이 초과 링크는 요청 없이 버림
            if depth >= self.config.max_depth {
                continue;
            }

            for link in links {
                let Some(child) = self.resolve(&link) else {
                    continue;
                };
                if visited.insert(child.to_string()) {
                    frontier.push_back((child, depth + 1));
                }
            }
        }
    }

    /// 페이지 하나 방문: 가져오기 → 추출 → 저장, 발견한 링크 반환
    async fn visit(&self, url: &Url, depth: usize, report: &mut CrawlReport) -> Vec<String> {
        report.pages_visited += 1;

        let html = match self.fetcher.fetch(url.as_str()).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Failed to crawl {}: {:#}", url, e);
                report.pages_failed += 1;
                return vec![];
            }
        };

        let (page, links) = self.parse_page(&html);

        if page.content.chars().count() > self.config.min_content_length {
            let doc = Document::new(url.as_str(), page.title, page.content);
            match self.store.upsert(doc) {
                Ok(_) => {
                    report.documents_stored += 1;
                    tracing::info!("Stored: {} (depth={})", url, depth);
                }
                Err(e) => {
                    tracing::warn!("Failed to store {}: {:#}", url, e);
                    report.pages_failed += 1;
                }
            }
        } else {
            tracing::debug!(
                "Skipping short page: {} ({} chars)",
                url,
                page.content.chars().count()
            );
            report.pages_skipped += 1;
        }

        tracing::debug!("Discovered {} links on {}", links.len(), url);
        links
    }

    /// HTML 파싱 후 추출과 링크 탐색 (await 구간 밖에서 수행)
    fn parse_page(&self, html: &str) -> (ExtractedPage, Vec<String>) {
        let document = Html::parse_document(html);
        let page = self.extractor.extract(&document);
        let links = discover_links(
            &document,
            &self.config.link_prefixes,
            self.config.max_links_per_page,
        );
        (page, links)
    }

    /// 사이트 루트 기준 경로를 절대 URL로 변환
    fn resolve(&self, path: &str) -> Option<Url> {
        match self.base.join(path) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!("Invalid crawl path {}: {}", path, e);
                None
            }
        }
    }
}

// ============================================================================
// Link Discovery
// ============================================================================

/// 사이트 내부 링크 탐색
///
/// `href`가 허용 prefix로 시작하는 사이트 루트 기준 상대 링크만 수집합니다.
/// fragment는 제거하고, 페이지 내 중복을 제외한 뒤 최대 `limit`개까지 반환합니다.
pub fn discover_links(document: &Html, prefixes: &[String], limit: usize) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return vec![];
    };

    let mut links: Vec<String> = Vec::new();

    for element in document.select(&selector) {
        if links.len() >= limit {
            break;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let path = href.trim().split('#').next().unwrap_or_default();

        // 절대 URL, 프로토콜 상대 URL 제외
        if !path.starts_with('/') || path.starts_with("//") {
            continue;
        }
        if !prefixes.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            continue;
        }
        if !links.iter().any(|link| link == path) {
            links.push(path.to_string());
        }
    }

    links
}

// ============================================================================
// Tests
// ============================================================================
