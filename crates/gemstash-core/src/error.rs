//! Core error types

use thiserror::Error;

/// Misuse of a path rewriter
#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("Invalid rewrite pattern: {0}")]
    InvalidPattern(String),

    #[error("Request path did not match the rewrite pattern")]
    NoMatch,

    #[error("Request path was already rewritten")]
    AlreadyRewritten,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Rewrite error: {0}")]
    Rewrite(#[from] RewriteError),

    #[error("Proxy error: {0}")]
    Proxy(#[from] gemstash_proxy::ProxyError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Upstream override not allowed: {0}")]
    OverrideDisabled(String),
}
