//! 클라이언트별 토큰 버킷 rate limiter

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;

use super::error::ApiError;

/// 추적 클라이언트 수가 이 값을 넘으면 가득 찬 버킷을 정리
const MAX_TRACKED_CLIENTS: usize = 4096;

/// 윈도우당 최대 요청 수를 버스트 용량으로, 윈도우 동안 균등 충전
pub struct RateLimiter {
    buckets: Mutex<HashMap<Option<IpAddr>, Bucket>>,
    capacity: f64,
    refill_per_sec: f64,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// 0 값이 들어오면 비활성화 (`None`)
    pub fn new(max_requests: u32, window: Duration) -> Option<Self> {
        if max_requests == 0 || window.is_zero() {
            return None;
        }
        let capacity = max_requests as f64;
        Some(Self {
            buckets: Mutex::new(HashMap::new()),
            capacity,
            refill_per_sec: capacity / window.as_secs_f64(),
        })
    }

    /// 요청 허용 여부 (허용 시 토큰 1개 소비)
    pub async fn acquire(&self, client: Option<IpAddr>) -> bool {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();

        if buckets.len() >= MAX_TRACKED_CLIENTS {
            let (capacity, rate) = (self.capacity, self.refill_per_sec);
            buckets.retain(|_, bucket| {
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens + elapsed * rate < capacity
            });
        }

        let bucket = buckets.entry(client).or_insert(Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.last_refill = now;
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// axum 미들웨어: 초과 시 429
pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let client = connect_info.map(|ConnectInfo(addr)| addr.ip());

    if !limiter.acquire(client).await {
        tracing::warn!("Rate limit exceeded for {:?}", client);
        return ApiError::TooManyRequests.into_response();
    }

    next.run(request).await
}
