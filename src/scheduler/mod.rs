//! 갱신 스케줄러
//!
//! - 시작 시: 크롤 기록이 없거나 갱신 주기를 넘겼으면 즉시 크롤 (완료까지 대기)
//! - 이후: 고정 주기마다 무조건 크롤을 트리거 (이전 결과/소요 시간과 무관)
//!
//! 주기 크롤은 별도 태스크로 실행되므로 타이머는 크롤 소요 시간에 밀리지 않으며,
//! 겹치는 트리거는 서비스의 single-flight 가드에서 하나로 합쳐집니다.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::crawler::CrawlReport;
use crate::service::KnowledgeService;

/// 갱신 스케줄러
pub struct RefreshScheduler {
    service: Arc<KnowledgeService>,
    interval: Duration,
}

impl RefreshScheduler {
    /// 서비스의 갱신 주기로 생성
    pub fn new(service: Arc<KnowledgeService>) -> Self {
        let interval = service.refresh_interval();
        Self { service, interval }
    }

    /// 주기 지정
    pub fn with_interval(service: Arc<KnowledgeService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// 시작 시 신선도 확인
    ///
    /// 갱신이 필요하면 크롤을 실행하고 완료될 때까지 기다립니다.
    ///
    /// # Returns
    /// 크롤을 실행했으면 `Some(report)`, 이미 최신이면 `None`
    pub async fn ensure_fresh(&self) -> Result<Option<CrawlReport>> {
        if !self.service.needs_update()? {
            tracing::info!("Knowledge base is up to date, skipping initial crawl");
            return Ok(None);
        }

        tracing::info!("Knowledge base needs update, crawling before serving");
        let report = self.service.refresh().await?;
        Ok(Some(report))
    }

    /// 주기 갱신 태스크 시작
    ///
    /// 첫 실행은 한 주기 뒤입니다.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                tracing::info!("Scheduled knowledge base refresh");

                let service = Arc::clone(&self.service);
                tokio::spawn(async move {
                    match service.refresh().await {
                        Ok(report) => tracing::info!(
                            "Scheduled refresh complete: {} documents stored",
                            report.documents_stored
                        ),
                        Err(e) => tracing::error!("Scheduled refresh failed: {:#}", e),
                    }
                });
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::config::CrawlConfig;
    use crate::scraper::PageFetcher;

    struct CountingSite {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for CountingSite {
        async fn fetch(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("<html><body><main>\
                Scheduler test page with more than fifty characters of body text.\
                </main></body></html>"
                .to_string())
        }
    }

    fn setup() -> (Arc<CountingSite>, Arc<KnowledgeService>) {
        let site = Arc::new(CountingSite {
            calls: AtomicUsize::new(0),
        });
        let config = CrawlConfig {
            base_url: "https://docs.test".to_string(),
            seed_paths: vec!["/Asset/Seed".to_string()],
            ..CrawlConfig::default().without_delays()
        };
        let service = KnowledgeService::from_config(config, site.clone(), Duration::from_secs(3600))
            .unwrap();
        (site, Arc::new(service))
    }

    #[tokio::test]
    async fn test_ensure_fresh_crawls_once() {
        let (site, service) = setup();
        let scheduler = RefreshScheduler::new(Arc::clone(&service));

        let first = scheduler.ensure_fresh().await.unwrap();
        assert!(first.is_some());
        assert!(!service.needs_update().unwrap());

        // 이미 최신이면 건너뜀
        let second = scheduler.ensure_fresh().await.unwrap();
        assert!(second.is_none());
        assert_eq!(site.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_spawn_triggers_periodic_refresh() {
        let (site, service) = setup();
        let scheduler =
            RefreshScheduler::with_interval(Arc::clone(&service), Duration::from_millis(50));

        let handle = scheduler.spawn();
        tokio::time::sleep(Duration::from_millis(180)).await;
        handle.abort();

        let calls = site.calls.load(Ordering::SeqCst);
        assert!(calls >= 2, "expected at least two refreshes, got {}", calls);
        assert!(service.last_crawl_time().unwrap().is_some());
    }
}
