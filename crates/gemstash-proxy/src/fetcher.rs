//! Validated gem downloads
//!
//! [`GemFetcher`] retrieves a single `.gem` file through an [`UpstreamClient`],
//! keeps only the response headers the cache is allowed to depend on, and
//! refuses to hand out a payload shorter than the upstream declared.

use bytes::Bytes;
use http::HeaderMap;
use http::header::CONTENT_LENGTH;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::UpstreamClient;
use crate::error::ProxyError;

/// Response headers that pass through to callers
pub const VALID_HEADERS: [&str; 4] = ["etag", "content-type", "content-length", "last-modified"];

/// Allow-listed response metadata, keyed by lower-case header name
pub type Metadata = BTreeMap<String, String>;

/// A downloaded gem and its metadata
#[derive(Debug, Clone)]
pub struct FetchedGem {
    pub body: Bytes,
    pub metadata: Metadata,
}

/// Fetches gems from an upstream and validates the download
pub struct GemFetcher {
    client: Arc<UpstreamClient>,
}

impl GemFetcher {
    pub fn new(client: Arc<UpstreamClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }

    /// Fetch `/gems/{gem_id}`
    pub async fn fetch(&self, gem_id: &str) -> Result<FetchedGem, ProxyError> {
        self.fetch_with(gem_id, |body, metadata| FetchedGem { body, metadata })
            .await
    }

    /// Fetch `/gems/{gem_id}` and pass the validated download to `f`
    ///
    /// `f` is only called once the payload has been checked against the
    /// declared `content-length`.
    pub async fn fetch_with<F, R>(&self, gem_id: &str, f: F) -> Result<R, ProxyError>
    where
        F: FnOnce(Bytes, Metadata) -> R,
    {
        debug!("Fetching gem: {}", gem_id);
        check_gem_id(gem_id)?;

        let result = self.client.get(&format!("/gems/{}", gem_id)).await;
        let (body, headers) = match result {
            Ok(r) => r,
            Err(e) => {
                metrics::counter!("gemstash_gem_fetches_total", "outcome" => "upstream_error")
                    .increment(1);
                return Err(e);
            }
        };

        let metadata = filter_headers(&headers);
        if let Err(e) = validate_download(&body, &metadata) {
            warn!("Rejected download of {}: {}", gem_id, e);
            metrics::counter!("gemstash_gem_fetches_total", "outcome" => "incomplete")
                .increment(1);
            return Err(e);
        }

        metrics::counter!("gemstash_gem_fetches_total", "outcome" => "ok").increment(1);
        Ok(f(body, metadata))
    }
}

/// A gem id must stay a single segment under `/gems/`
fn check_gem_id(gem_id: &str) -> Result<(), ProxyError> {
    let escapes = gem_id.is_empty()
        || gem_id == "."
        || gem_id == ".."
        || gem_id.contains(['/', '\\', '?', '#']);

    if escapes {
        return Err(ProxyError::InvalidGemId(gem_id.to_string()));
    }
    Ok(())
}

/// Keep only allow-listed headers, lower-casing their names
pub fn filter_headers(headers: &HeaderMap) -> Metadata {
    let mut metadata = Metadata::new();

    for (name, value) in headers {
        let allowed = VALID_HEADERS
            .iter()
            .any(|valid| name.as_str().eq_ignore_ascii_case(valid));
        if !allowed {
            continue;
        }

        match value.to_str() {
            Ok(v) => {
                metadata.insert(name.as_str().to_ascii_lowercase(), v.to_string());
            }
            Err(_) => debug!("Dropping non-text header value for {}", name),
        }
    }

    metadata
}

/// Reject payloads shorter than the declared length.
///
/// Without a usable `content-length` there is nothing to compare against and
/// the check is skipped.
fn validate_download(body: &Bytes, metadata: &Metadata) -> Result<(), ProxyError> {
    let Some(declared) = metadata.get(CONTENT_LENGTH.as_str()) else {
        debug!("No content-length from upstream, skipping size check");
        return Ok(());
    };

    let Ok(expected) = declared.trim().parse::<u64>() else {
        warn!("Unparsable content-length {:?}, skipping size check", declared);
        return Ok(());
    };

    let actual = body.len() as u64;
    if actual < expected {
        return Err(ProxyError::IncompleteDownload { expected, actual });
    }

    Ok(())
}
