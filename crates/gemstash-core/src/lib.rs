//! Gemstash Core Routing Logic
//!
//! This crate provides request path rewriting, upstream selection and the
//! shared configuration sections used by the server.

pub mod config;
pub mod error;
pub mod rewriter;
pub mod upstream;

pub use config::{RoutingConfig, UPSTREAM_URL_CAPTURE, UpstreamConfig};
pub use error::{CoreError, RewriteError};
pub use rewriter::{Captures, EnvRewriter, RequestEnv, RewriteContext};
pub use upstream::UpstreamSelector;
