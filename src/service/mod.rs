//! Knowledge Service - 저장소 + 크롤러 + 마지막 크롤 시각을 소유하는 서비스 객체
//!
//! HTTP 핸들러와 스케줄러는 이 객체 하나를 공유합니다 (`Arc<KnowledgeService>`).
//!
//! ## 단일 실행 (single-flight)
//! 크롤은 한 번에 하나만 실행됩니다. 크롤이 진행 중일 때 들어온 `refresh` 호출은
//! 새 크롤을 시작하지 않고 진행 중인 크롤이 끝나기를 기다려 그 결과를 공유합니다.
//! 검색은 이 잠금과 무관하게 저장소 스냅샷을 읽으므로 크롤 중에도 막히지 않습니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use crate::config::CrawlConfig;
use crate::crawler::{CrawlReport, Crawler};
use crate::knowledge::{KnowledgeStore, SearchResult};
use crate::scraper::PageFetcher;

/// 지식베이스 서비스
pub struct KnowledgeService {
    crawler: Crawler,
    refresh_interval: Duration,
    /// 마지막으로 완료된 (중단되지 않은) 크롤 시각
    last_crawl: RwLock<Option<DateTime<Utc>>>,
    crawl_gate: tokio::sync::Mutex<()>,
    /// 종료된 크롤 수 (성공/실패 모두)
    completed_crawls: AtomicU64,
    last_outcome: Mutex<Option<Result<CrawlReport, String>>>,
}

impl KnowledgeService {
    /// 크롤러로 서비스 생성
    pub fn new(crawler: Crawler, refresh_interval: Duration) -> Self {
        Self {
            crawler,
            refresh_interval,
            last_crawl: RwLock::new(None),
            crawl_gate: tokio::sync::Mutex::new(()),
            completed_crawls: AtomicU64::new(0),
            last_outcome: Mutex::new(None),
        }
    }

    /// 설정과 fetcher로 빈 저장소를 가진 서비스 생성
    pub fn from_config(
        config: CrawlConfig,
        fetcher: Arc<dyn PageFetcher>,
        refresh_interval: Duration,
    ) -> Result<Self> {
        let store = Arc::new(KnowledgeStore::new());
        let crawler = Crawler::new(config, fetcher, store)?;
        Ok(Self::new(crawler, refresh_interval))
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        self.crawler.store()
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// 키워드 검색 (크롤 진행 여부와 무관)
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        self.store().search(query, limit)
    }

    /// 마지막 크롤 완료 시각
    pub fn last_crawl_time(&self) -> Result<Option<DateTime<Utc>>> {
        let last = self
            .last_crawl
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(*last)
    }

    /// 갱신 필요 여부 (크롤 기록 없음 또는 갱신 주기 초과)
    pub fn needs_update(&self) -> Result<bool> {
        self.needs_update_at(Utc::now())
    }

    /// 지정 시각 기준 갱신 필요 여부
    pub fn needs_update_at(&self, now: DateTime<Utc>) -> Result<bool> {
        let Some(last) = self.last_crawl_time()? else {
            return Ok(true);
        };

        // 시계가 뒤로 간 경우 음수 → 갱신 불필요로 취급
        Ok(match (now - last).to_std() {
            Ok(elapsed) => elapsed > self.refresh_interval,
            Err(_) => false,
        })
    }

    /// 크롤 진행 중 여부
    pub fn is_crawling(&self) -> bool {
        self.crawl_gate.try_lock().is_err()
    }

    /// 전체 크롤 실행 (single-flight)
    ///
    /// 성공 시에만 마지막 크롤 시각을 갱신합니다. 실패해도 저장된 문서는 유지됩니다.
    pub async fn refresh(&self) -> Result<CrawlReport> {
        let generation = self.completed_crawls.load(Ordering::Acquire);
        let _guard = self.crawl_gate.lock().await;

        // 기다리는 동안 다른 크롤이 끝났으면 그 결과를 공유
        if self.completed_crawls.load(Ordering::Acquire) != generation {
            tracing::info!("Joined in-flight crawl, sharing its result");
            return self.shared_outcome();
        }

        let outcome = self.crawler.crawl().await;

        match &outcome {
            Ok(report) => {
                let mut last = self
                    .last_crawl
                    .write()
                    .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
                *last = Some(report.finished_at);
            }
            Err(e) => tracing::error!("Crawl failed: {:#}", e),
        }

        {
            let mut shared = self
                .last_outcome
                .lock()
                .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
            *shared = Some(match &outcome {
                Ok(report) => Ok(report.clone()),
                Err(e) => Err(format!("{:#}", e)),
            });
        }
        self.completed_crawls.fetch_add(1, Ordering::Release);

        outcome
    }

    fn shared_outcome(&self) -> Result<CrawlReport> {
        let shared = self
            .last_outcome
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        match shared.as_ref() {
            Some(Ok(report)) => Ok(report.clone()),
            Some(Err(message)) => bail!("{}", message),
            None => bail!("No crawl outcome recorded"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use crate::knowledge::Document;

    /// 모든 URL에 같은 페이지를 지연 후 반환
    struct SlowSite {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl SlowSite {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
            })
        }
    }

    #[async_trait]
    impl PageFetcher for SlowSite {
        async fn fetch(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok("<html><head><title>Seed</title></head><body><main>\
                A seed page with plenty of text to pass the minimum length check.\
                </main></body></html>"
                .to_string())
        }
    }

    fn service(site: Arc<SlowSite>, crawl_timeout: Option<Duration>) -> KnowledgeService {
        let config = CrawlConfig {
            base_url: "https://docs.test".to_string(),
            seed_paths: vec!["/Asset/Seed".to_string()],
            crawl_timeout,
            ..CrawlConfig::default().without_delays()
        };
        KnowledgeService::from_config(config, site, Duration::from_secs(24 * 60 * 60)).unwrap()
    }

    #[test]
    fn test_initial_state_needs_update() {
        let service = service(SlowSite::new(Duration::ZERO), None);
        assert!(service.last_crawl_time().unwrap().is_none());
        assert!(service.needs_update().unwrap());
        assert!(!service.is_crawling());
    }

    #[tokio::test]
    async fn test_refresh_records_timestamp() {
        let service = service(SlowSite::new(Duration::ZERO), None);

        let report = service.refresh().await.unwrap();
        assert_eq!(report.documents_stored, 1);

        let last = service.last_crawl_time().unwrap();
        assert_eq!(last, Some(report.finished_at));
        assert!(!service.needs_update().unwrap());

        let later = report.finished_at + chrono::Duration::hours(25);
        assert!(service.needs_update_at(later).unwrap());
        let sooner = report.finished_at + chrono::Duration::hours(23);
        assert!(!service.needs_update_at(sooner).unwrap());
    }

    #[tokio::test]
    async fn test_failed_crawl_keeps_needs_update() {
        let site = SlowSite::new(Duration::from_secs(30));
        let service = service(site, Some(Duration::from_millis(50)));
        service
            .store()
            .upsert(Document::new("https://docs.test/old", "Old", "previously stored content"))
            .unwrap();

        assert!(service.refresh().await.is_err());

        assert!(service.last_crawl_time().unwrap().is_none());
        assert!(service.needs_update().unwrap());
        assert_eq!(service.store().len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_single_flight() {
        let site = SlowSite::new(Duration::from_millis(100));
        let service = service(site.clone(), None);

        let (first, second) = tokio::join!(service.refresh(), service.refresh());

        let first = first.unwrap();
        let second = second.unwrap();
        assert_eq!(site.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.started_at, second.started_at);

        // 끝난 뒤의 호출은 새 크롤
        service.refresh().await.unwrap();
        assert_eq!(site.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_search_during_crawl() {
        let site = SlowSite::new(Duration::from_millis(300));
        let service = Arc::new(service(site, None));
        service
            .store()
            .upsert(Document::new(
                "https://docs.test/Asset/Old",
                "Workflow",
                "Existing workflow content",
            ))
            .unwrap();

        let crawling = Arc::clone(&service);
        let handle = tokio::spawn(async move { crawling.refresh().await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(service.is_crawling());
        let results = service.search("workflow", 5).unwrap();
        assert_eq!(results.len(), 1);

        handle.await.unwrap().unwrap();
        assert!(!service.is_crawling());
        assert_eq!(service.store().len().unwrap(), 2);
    }
}
