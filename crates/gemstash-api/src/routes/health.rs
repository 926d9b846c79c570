//! Health check endpoints

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Health status response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub upstream: String,
}

/// Health check handler
///
/// Reports the configured upstream without contacting it.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    metrics::counter!("gemstash_health_checks_total").increment(1);

    let upstream = state.upstreams.default_fetcher().client().base_url().to_string();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        upstream,
    })
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
}
