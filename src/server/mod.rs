//! HTTP 서버 모듈 - axum 라우터
//!
//! | 경로 | 설명 |
//! |---|---|
//! | `GET /` | 동작 확인 텍스트 |
//! | `GET /health` | 프로세스 생존 확인 |
//! | `GET /api/health` | 상태 + 문서 수 + 마지막 크롤 시각 |
//! | `POST /api/chat` | 검색 결과 기반 채팅 응답 |
//! | `GET /api/search` | 키워드 검색 (`q`, `limit`) |
//! | `GET/POST /api/scrape` | 수동 전체 크롤 (완료까지 대기) |
//! | `GET /api/knowledge/stats` | 문서 수 + 갱신 필요 여부 |

mod error;
mod rate_limit;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::chat::{self, ChatAnswer, ChatMessage, ChatProvider};
use crate::config::ServerConfig;
use crate::knowledge::SearchResult;
use crate::service::KnowledgeService;

pub use error::ApiError;
pub use rate_limit::RateLimiter;

/// `/api/search` 기본 결과 수
pub const DEFAULT_API_SEARCH_LIMIT: usize = 10;

// ============================================================================
// State
// ============================================================================

/// 핸들러 공유 상태
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<KnowledgeService>,
    /// API 키가 없으면 None (채팅 요청은 500)
    pub chat: Option<Arc<dyn ChatProvider>>,
}

impl AppState {
    pub fn new(service: Arc<KnowledgeService>, chat: Option<Arc<dyn ChatProvider>>) -> Self {
        Self { service, chat }
    }
}

// ============================================================================
// Router
// ============================================================================

/// 라우터 + 미들웨어 구성
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(liveness))
        .route("/api/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/search", get(search))
        .route("/api/scrape", get(scrape).post(scrape))
        .route("/api/knowledge/stats", get(knowledge_stats))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(config.body_limit));

    if let Some(limiter) = RateLimiter::new(config.rate_limit_max, config.rate_limit_window) {
        router = router.layer(middleware::from_fn_with_state(
            Arc::new(limiter),
            rate_limit::enforce,
        ));
    }

    router
        .layer(cors_layer(&config.allowed_origins))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 허용 목록 기반 CORS (credentials 허용)
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin {}: {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// 서버 실행 (Ctrl-C 시 정상 종료)
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<()> {
    let app = router(state, config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server is running on port {}", config.port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// ============================================================================
// Handlers
// ============================================================================

async fn root() -> &'static str {
    "Eptura knowledge assistant backend is running"
}

#[derive(Serialize)]
struct LivenessResponse {
    status: &'static str,
}

async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "Backend is healthy",
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    knowledge_base_size: usize,
    last_scrape_time: Option<DateTime<Utc>>,
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(HealthResponse {
        status: "OK",
        knowledge_base_size: state.service.store().len()?,
        last_scrape_time: state.service.last_crawl_time()?,
    }))
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    conversation: Option<Vec<ChatMessage>>,
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatAnswer>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let message = request
        .message
        .filter(|message| !message.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Message is required."))?;

    let provider = state.chat.as_deref().ok_or_else(|| {
        ApiError::internal(
            "Failed to process chat request",
            "OPENAI_API_KEY is not configured",
        )
    })?;

    let conversation = request.conversation.unwrap_or_default();
    let answer = chat::answer_question(&state.service, provider, &message, &conversation)
        .await
        .map_err(|e| ApiError::internal("Failed to process chat request", format!("{:#}", e)))?;

    Ok(Json(answer))
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let query = params
        .q
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("Query parameter 'q' is required."))?;
    let limit = params.limit.unwrap_or(DEFAULT_API_SEARCH_LIMIT);

    let results = state.service.search(&query, limit)?;
    Ok(Json(SearchResponse { results }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeResponse {
    message: &'static str,
    entries_count: usize,
}

async fn scrape(State(state): State<AppState>) -> Result<Json<ScrapeResponse>, ApiError> {
    tracing::info!("Manual scrape requested");

    state
        .service
        .refresh()
        .await
        .map_err(|e| ApiError::internal("Scraping failed", format!("{:#}", e)))?;

    Ok(Json(ScrapeResponse {
        message: "Scraping completed",
        entries_count: state.service.store().len()?,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    total_entries: usize,
    last_scrape_time: Option<DateTime<Utc>>,
    needs_update: bool,
}

async fn knowledge_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    Ok(Json(StatsResponse {
        total_entries: state.service.store().len()?,
        last_scrape_time: state.service.last_crawl_time()?,
        needs_update: state.service.needs_update()?,
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

// ============================================================================
// Tests
// ============================================================================
