//! API routes

mod gems;
mod health;

use axum::{
    Router,
    extract::State,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;

use crate::middleware::rewrite_upstream;
use crate::state::{AppState, MetricsHandle};

/// GET /metrics - Prometheus metrics endpoint
async fn get_metrics(State(handle): State<Arc<MetricsHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let mut router = Router::new()
        .merge(health::routes())
        .merge(gems::routes())
        .with_state(state);

    if let Some(handle) = metrics_handle {
        router = router.merge(
            Router::new()
                .route("/metrics", get(get_metrics))
                .with_state(handle),
        );
    }

    router
}

/// Create the application: the router behind the upstream prefix rewrite
pub fn create_app(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let router = create_router(state.clone(), metrics_handle);

    Router::new()
        .fallback_service(router)
        .layer(from_fn_with_state(state, rewrite_upstream))
}
