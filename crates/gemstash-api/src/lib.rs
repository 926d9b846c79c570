//! Gemstash HTTP API
//!
//! This crate provides the Axum-based HTTP front end: gem and index routes
//! served from the upstream, the `/upstream/<url>` routing prefix, health
//! and metrics.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use middleware::UpstreamOverride;
pub use routes::{create_app, create_router};
pub use state::{AppState, MetricsHandle};
