//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gemstash_core::CoreError;
use gemstash_proxy::ProxyError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),
}

/// Translate a fetch fault into the response relayed to the client.
///
/// Upstream statuses pass through unchanged; local faults are server errors.
fn proxy_parts(e: &ProxyError) -> (StatusCode, &'static str, String) {
    match e {
        ProxyError::Upstream { status, message } => (
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            "UPSTREAM_ERROR",
            message.clone(),
        ),
        ProxyError::Connection(_) | ProxyError::Transport(_) => {
            (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE", e.to_string())
        }
        ProxyError::InvalidUrl(_) => (StatusCode::BAD_REQUEST, "INVALID_UPSTREAM", e.to_string()),
        ProxyError::InvalidGemId(_) => (StatusCode::BAD_REQUEST, "INVALID_GEM_ID", e.to_string()),
        ProxyError::IncompleteDownload { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "INCOMPLETE_DOWNLOAD",
            e.to_string(),
        ),
        ProxyError::Client(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string()),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Proxy(e) => proxy_parts(e),
            ApiError::Core(e) => match e {
                CoreError::Proxy(e) => proxy_parts(e),
                CoreError::OverrideDisabled(_) => {
                    (StatusCode::FORBIDDEN, "FORBIDDEN", e.to_string())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    e.to_string(),
                ),
            },
        };

        if status.is_server_error() {
            error!("Request failed with {}: {}", status, self);
        }

        let body = axum::Json(json!({
            "errors": [{
                "code": code,
                "message": message,
                "detail": null
            }]
        }));

        (status, body).into_response()
    }
}
