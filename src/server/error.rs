//! HTTP 에러 타입 - 모든 실패는 해당 요청 안에서 JSON 응답으로 끝납니다

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// API 에러
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 요청 검증 실패 (400)
    #[error("{0}")]
    BadRequest(String),

    /// 매칭되는 라우트 없음 (404)
    #[error("Not found")]
    NotFound,

    /// rate limit 초과 (429)
    #[error("Too many requests, please try again later.")]
    TooManyRequests,

    /// 하위 의존성 실패 / 예상치 못한 에러 (500)
    #[error("{error}: {details}")]
    Internal { error: String, details: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// 일반 메시지 + 상세 원인으로 500 에러 생성
    pub fn internal(error: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Self::Internal {
            error: error.into(),
            details: source.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::internal("Internal server error", format!("{:#}", e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Internal { error, details } => {
                tracing::error!("{}: {}", error, details);
                json!({ "error": error, "details": details })
            }
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
