//! Configuration loading

use anyhow::{Context, Result};
use gemstash_core::{RoutingConfig, UpstreamConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9292
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.upstream.validate()?;
        self.routing.upstream_rewriter()?;

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            anyhow::bail!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 9292);
        assert_eq!(config.upstream.url, "https://rubygems.org");
        assert_eq!(config.upstream.retries, 3);
        assert_eq!(config.logging.format, "pretty");
        assert!(config.metrics.enabled);
        assert!(config.routing.allow_upstream_override);
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
            [server]
            bind_address = "127.0.0.1"
            port = 8080

            [upstream]
            url = "https://gems.example"
            user_agent = "acme-ci"
            retries = 5

            [routing]
            upstream_pattern = "^/via/(?<upstream_url>[^/]+)"
            allow_upstream_override = false

            [logging]
            level = "debug"
            format = "json"

            [metrics]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.upstream.user_agent.as_deref(), Some("acme-ci"));
        assert_eq!(config.upstream.retries, 5);
        assert!(!config.routing.allow_upstream_override);
        assert_eq!(config.logging.level, "debug");
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Config::parse("[upstream]\nretries = 0").is_err());
        assert!(Config::parse("[routing]\nupstream_pattern = \"^/x/[^/]+\"").is_err());
        assert!(Config::parse("[logging]\nformat = \"xml\"").is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/gemstash.toml").unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0");
    }
}
