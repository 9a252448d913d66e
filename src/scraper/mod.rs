//! 웹 스크래퍼 모듈 - 페이지 HTML 가져오기
//!
//! 크롤러가 네트워크에 접근하는 유일한 경로입니다.
//! `PageFetcher` 트레이트로 추상화되어 있어 테스트에서는 인메모리 사이트로 대체합니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::CrawlConfig;
use crate::extractor::ContentExtractor;

// ============================================================================
// PageFetcher Trait
// ============================================================================

/// 페이지 HTML을 가져오는 인터페이스
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// 절대 URL의 HTML 본문 반환 (2xx 외 응답은 에러)
    async fn fetch(&self, url: &str) -> Result<String>;
}

// ============================================================================
// WebScraper
// ============================================================================

/// 스크랩된 콘텐츠
#[derive(Debug, Clone)]
pub struct ScrapedContent {
    /// 페이지 제목
    pub title: String,
    /// 본문 텍스트 (정규화됨)
    pub content: String,
    /// 원본 URL
    pub url: String,
}

/// reqwest 기반 웹 스크래퍼
pub struct WebScraper {
    client: reqwest::Client,
}

impl WebScraper {
    /// 새 스크래퍼 생성
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("HTTP 클라이언트 생성 실패")?;

        Ok(Self { client })
    }

    /// 크롤 설정의 User-Agent / 타임아웃으로 생성
    pub fn from_config(config: &CrawlConfig) -> Result<Self> {
        Self::new(&config.user_agent, config.request_timeout)
    }

    /// 단일 URL에서 콘텐츠 추출
    pub async fn scrape(&self, url: &str) -> Result<ScrapedContent> {
        let html = self.fetch(url).await?;
        let page = ContentExtractor::new().extract_html(&html);

        Ok(ScrapedContent {
            title: page.title,
            content: page.content,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl PageFetcher for WebScraper {
    async fn fetch(&self, url: &str) -> Result<String> {
        tracing::debug!("Fetching: {}", url);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .with_context(|| format!("HTTP 요청 실패: {}", url))?
            .error_for_status()
            .with_context(|| format!("HTTP 에러 응답: {}", url))?;

        response.text().await.context("응답 본문 읽기 실패")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scraper_creation() {
        let scraper = WebScraper::new("test-agent/1.0", Duration::from_secs(1));
        assert!(scraper.is_ok());
    }

    #[test]
    fn test_scraper_from_config() {
        let scraper = WebScraper::from_config(&CrawlConfig::default());
        assert!(scraper.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_invalid_url_fails() {
        let scraper = WebScraper::new("test-agent/1.0", Duration::from_secs(1))
            .expect("scraper creation failed");
        let result = scraper.fetch("not a url").await;
        assert!(result.is_err());
    }
}
