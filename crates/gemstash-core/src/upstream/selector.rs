//! Per-request upstream selection

use std::sync::Arc;

use gemstash_proxy::{GemFetcher, UpstreamClient, UpstreamOrigin, UpstreamTransport};
use tracing::{debug, info, warn};

use crate::config::UpstreamConfig;
use crate::error::CoreError;

/// Chooses the gem fetcher that serves a request
pub struct UpstreamSelector {
    default: Arc<GemFetcher>,
    transport: Arc<dyn UpstreamTransport>,
    user_agent: Option<String>,
    retries: u32,
    allow_override: bool,
}

impl UpstreamSelector {
    /// Create a selector for the configured default upstream
    pub fn new(
        config: &UpstreamConfig,
        allow_override: bool,
        transport: Arc<dyn UpstreamTransport>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let client = UpstreamClient::with_transport(&config.origin(), transport.clone())?
            .with_retries(config.retries);

        info!(
            "Default upstream: {} (User-Agent: {})",
            client.base_url(),
            client.user_agent()
        );

        Ok(Self {
            default: Arc::new(GemFetcher::new(Arc::new(client))),
            transport,
            user_agent: config.user_agent.clone(),
            retries: config.retries,
            allow_override,
        })
    }

    /// Fetcher for the configured upstream
    pub fn default_fetcher(&self) -> Arc<GemFetcher> {
        self.default.clone()
    }

    /// Fetcher for `upstream_url` when given, otherwise the default
    pub fn select(&self, upstream_url: Option<&str>) -> Result<Arc<GemFetcher>, CoreError> {
        let Some(url) = upstream_url else {
            return Ok(self.default_fetcher());
        };

        if !self.allow_override {
            warn!("Rejected upstream override to {}", url);
            return Err(CoreError::OverrideDisabled(url.to_string()));
        }

        let mut origin = UpstreamOrigin::new(url);
        if let Some(user_agent) = &self.user_agent {
            origin = origin.with_user_agent(user_agent.clone());
        }

        let client =
            UpstreamClient::with_transport(&origin, self.transport.clone())?.with_retries(self.retries);
        debug!("Using upstream override: {}", client.base_url());

        Ok(Arc::new(GemFetcher::new(Arc::new(client))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemstash_proxy::{ProxyError, ReqwestTransport};

    fn selector(allow_override: bool) -> UpstreamSelector {
        let config = UpstreamConfig {
            url: "https://rubygems.example/".to_string(),
            user_agent: Some("acme".to_string()),
            retries: 2,
        };
        let transport = Arc::new(ReqwestTransport::new().unwrap());
        UpstreamSelector::new(&config, allow_override, transport).unwrap()
    }

    #[test]
    fn test_default_upstream() {
        let selector = selector(true);
        let fetcher = selector.select(None).unwrap();
        assert_eq!(fetcher.client().base_url(), "https://rubygems.example");
        assert!(fetcher.client().user_agent().starts_with("acme Gemstash/"));
    }

    #[test]
    fn test_override_upstream() {
        let selector = selector(true);
        let fetcher = selector.select(Some("https://mirror.example")).unwrap();
        assert_eq!(fetcher.client().base_url(), "https://mirror.example");
        assert!(fetcher.client().user_agent().starts_with("acme Gemstash/"));
    }

    #[test]
    fn test_override_disabled() {
        let selector = selector(false);
        assert!(matches!(
            selector.select(Some("https://mirror.example")),
            Err(CoreError::OverrideDisabled(_))
        ));
        assert!(selector.select(None).is_ok());
    }

    #[test]
    fn test_override_invalid_url() {
        let selector = selector(true);
        assert!(matches!(
            selector.select(Some("not a url")),
            Err(CoreError::Proxy(ProxyError::InvalidUrl(_)))
        ));
    }
}
