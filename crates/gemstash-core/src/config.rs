//! Shared configuration types for upstream access and routing
//!
//! These types are shared across crates. The main config loading is done in
//! the `gemstash` binary, but these types define the sections used by
//! gemstash-core.

use gemstash_proxy::{DEFAULT_RETRIES, UpstreamOrigin};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::rewriter::EnvRewriter;

/// Capture group the upstream routing pattern must define
pub const UPSTREAM_URL_CAPTURE: &str = "upstream_url";

/// Default upstream gem server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream gem server
    #[serde(default = "default_upstream_url")]
    pub url: String,
    /// Prepended to the default `Gemstash/<version>` User-Agent
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Attempts made when the upstream cannot be reached
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl UpstreamConfig {
    pub fn origin(&self) -> UpstreamOrigin {
        let origin = UpstreamOrigin::new(self.url.clone());
        match &self.user_agent {
            Some(user_agent) => origin.with_user_agent(user_agent.clone()),
            None => origin,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.retries == 0 {
            return Err(CoreError::InvalidConfig(
                "upstream.retries must be at least 1".to_string(),
            ));
        }
        if self.url.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "upstream.url must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            user_agent: None,
            retries: default_retries(),
        }
    }
}

/// Request routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Pattern selecting a per-request upstream; must capture `upstream_url`
    #[serde(default = "default_upstream_pattern")]
    pub upstream_pattern: String,
    /// Whether requests may name their own upstream
    #[serde(default = "default_allow_upstream_override")]
    pub allow_upstream_override: bool,
}

impl RoutingConfig {
    /// Compile the upstream pattern, checking it captures `upstream_url`
    pub fn upstream_rewriter(&self) -> Result<EnvRewriter, CoreError> {
        let rewriter = EnvRewriter::parse(&self.upstream_pattern)?;
        if !rewriter.has_capture(UPSTREAM_URL_CAPTURE) {
            return Err(CoreError::InvalidConfig(format!(
                "routing.upstream_pattern must define a `{}` capture group",
                UPSTREAM_URL_CAPTURE
            )));
        }
        Ok(rewriter)
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            upstream_pattern: default_upstream_pattern(),
            allow_upstream_override: default_allow_upstream_override(),
        }
    }
}

fn default_upstream_url() -> String {
    "https://rubygems.org".to_string()
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_upstream_pattern() -> String {
    "^/upstream/(?<upstream_url>[^/]+)".to_string()
}

fn default_allow_upstream_override() -> bool {
    true
}
