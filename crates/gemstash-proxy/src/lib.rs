//! Gemstash Upstream Proxy
//!
//! This crate provides the client for communicating with an upstream gem
//! server: a retrying HTTP client bound to one origin, and a gem fetcher
//! that validates downloads before handing them to the caller.

pub mod client;
pub mod error;
pub mod fetcher;
pub mod transport;

pub use client::{DEFAULT_RETRIES, DEFAULT_USER_AGENT, UpstreamClient, UpstreamOrigin};
pub use error::ProxyError;
pub use fetcher::{FetchedGem, GemFetcher, Metadata, VALID_HEADERS};
pub use transport::{ReqwestTransport, TransportError, TransportResponse, UpstreamTransport};
