//! HTTP transport for upstream requests
//!
//! The upstream client performs every attempt through [`UpstreamTransport`],
//! which keeps the retry policy independent of the HTTP stack. The production
//! implementation wraps a shared `reqwest` client.

use async_trait::async_trait;
use bytes::Bytes;
use http::header::USER_AGENT;
use http::{HeaderMap, Method, StatusCode};
use reqwest::Client;
use std::error::Error as _;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::error::ProxyError;

/// Time allowed for establishing a connection to the upstream
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// A completed upstream response, whatever its status
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Failure of a single attempt
#[derive(Error, Debug)]
pub enum TransportError {
    /// The connection could not be established, or was dropped before a
    /// response arrived.
    #[error("{0}")]
    Connect(String),

    /// Anything that went wrong after a connection was made.
    #[error("{0}")]
    Other(String),
}

/// One HTTP attempt against an absolute URL
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn send(
        &self,
        method: Method,
        url: &str,
        user_agent: &str,
    ) -> Result<TransportResponse, TransportError>;
}

/// `reqwest`-backed transport; one instance can serve any number of origins
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with the fixed connect timeout
    pub fn new() -> Result<Self, ProxyError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProxyError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamTransport for ReqwestTransport {
    async fn send(
        &self,
        method: Method,
        url: &str,
        user_agent: &str,
    ) -> Result<TransportResponse, TransportError> {
        debug!("{} {}", method, url);

        let response = self
            .client
            .request(method, url)
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_connect() || is_dropped_connection(&err) {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

/// Whether the request failed because the connection went away under it
fn is_dropped_connection(err: &reqwest::Error) -> bool {
    if err.status().is_some() || err.is_body() || err.is_decode() || err.is_builder() {
        return false;
    }
    if err.is_request() {
        return true;
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        source = cause.source();
    }
    false
}
