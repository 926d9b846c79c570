//! Upstream gem server client

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::ProxyError;
use crate::transport::{ReqwestTransport, TransportError, TransportResponse, UpstreamTransport};

/// Identifier appended to every outbound User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("Gemstash/", env!("CARGO_PKG_VERSION"));

/// Total number of attempts made when the upstream cannot be reached
pub const DEFAULT_RETRIES: u32 = 3;

/// An upstream gem server
#[derive(Clone, Debug)]
pub struct UpstreamOrigin {
    /// Base URL of the upstream server
    pub url: String,
    /// Custom identification prepended to the default User-Agent
    pub user_agent: Option<String>,
}

impl UpstreamOrigin {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// The User-Agent sent to this origin: `"<custom> Gemstash/<version>"`
    pub fn composed_user_agent(&self) -> String {
        match self.user_agent.as_deref() {
            Some(custom) if !custom.is_empty() => format!("{} {}", custom, DEFAULT_USER_AGENT),
            _ => DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Retrying HTTP client bound to one upstream origin
pub struct UpstreamClient {
    base_url: String,
    user_agent: String,
    retries: u32,
    transport: Arc<dyn UpstreamTransport>,
}

impl UpstreamClient {
    /// Create a client with its own connection pool
    pub fn new(origin: &UpstreamOrigin) -> Result<Self, ProxyError> {
        Self::with_transport(origin, Arc::new(ReqwestTransport::new()?))
    }

    /// Create a client that sends through an existing transport
    pub fn with_transport(
        origin: &UpstreamOrigin,
        transport: Arc<dyn UpstreamTransport>,
    ) -> Result<Self, ProxyError> {
        url::Url::parse(&origin.url)
            .map_err(|e| ProxyError::InvalidUrl(format!("{}: {}", origin.url, e)))?;

        let user_agent = origin.composed_user_agent();
        HeaderValue::from_str(&user_agent)
            .map_err(|_| ProxyError::Client(format!("Invalid User-Agent: {:?}", user_agent)))?;

        Ok(Self {
            base_url: origin.url.trim_end_matches('/').to_string(),
            user_agent,
            retries: DEFAULT_RETRIES,
            transport,
        })
    }

    /// Override the attempt budget for connection failures (at least one)
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// GET a path, returning the body and response headers
    pub async fn get(&self, path: &str) -> Result<(Bytes, HeaderMap), ProxyError> {
        let response = self.request(Method::GET, path).await?;
        Ok((response.body, response.headers))
    }

    /// GET a path and hand the body and headers to `f`
    pub async fn get_with<F, R>(&self, path: &str, f: F) -> Result<R, ProxyError>
    where
        F: FnOnce(Bytes, HeaderMap) -> R,
    {
        let (body, headers) = self.get(path).await?;
        Ok(f(body, headers))
    }

    /// HEAD a path, returning the response headers
    pub async fn head(&self, path: &str) -> Result<HeaderMap, ProxyError> {
        let response = self.request(Method::HEAD, path).await?;
        Ok(response.headers)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn request(&self, method: Method, path: &str) -> Result<TransportResponse, ProxyError> {
        let url = self.url(path);
        let response = self.send_with_retries(method, &url).await?;
        let status = response.status.as_u16();

        if !(200..400).contains(&status) {
            warn!("Upstream returned {} for {}", status, url);
            metrics::counter!("gemstash_upstream_failures_total", "kind" => "status").increment(1);
            return Err(ProxyError::Upstream {
                status,
                message: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }

        Ok(response)
    }

    async fn send_with_retries(
        &self,
        method: Method,
        url: &str,
    ) -> Result<TransportResponse, ProxyError> {
        let mut remaining = self.retries;

        loop {
            remaining -= 1;

            match self.transport.send(method.clone(), url, &self.user_agent).await {
                Ok(response) => return Ok(response),
                Err(TransportError::Connect(message)) => {
                    error!("Connection failure for {}: {}", url, message);
                    metrics::counter!("gemstash_upstream_failures_total", "kind" => "connection")
                        .increment(1);

                    if remaining == 0 {
                        return Err(ProxyError::Connection(message));
                    }

                    info!("retrying... {} more times", remaining);
                    metrics::counter!("gemstash_upstream_retries_total").increment(1);
                }
                Err(TransportError::Other(message)) => {
                    error!("Request to {} failed: {}", url, message);
                    metrics::counter!("gemstash_upstream_failures_total", "kind" => "transport")
                        .increment(1);
                    return Err(ProxyError::Transport(message));
                }
            }
        }
    }
}
