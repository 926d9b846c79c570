//! Application state

use gemstash_core::{EnvRewriter, UpstreamSelector};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Handle used to render collected metrics
pub type MetricsHandle = PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub upstreams: Arc<UpstreamSelector>,
    pub upstream_rewriter: Arc<EnvRewriter>,
}

impl AppState {
    pub fn new(upstreams: Arc<UpstreamSelector>, upstream_rewriter: Arc<EnvRewriter>) -> Self {
        Self {
            upstreams,
            upstream_rewriter,
        }
    }
}
