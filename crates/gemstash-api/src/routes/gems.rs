//! Gem and index routes served from the upstream

use axum::{
    Extension, Router,
    extract::{Path, State},
    http::{HeaderName, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use gemstash_proxy::{Metadata, fetcher::filter_headers};
use tracing::debug;

use crate::error::ApiError;
use crate::middleware::UpstreamOverride;
use crate::state::AppState;

/// Build a response carrying the allow-listed upstream metadata.
///
/// `content-length` is left to the server, which derives it from the body.
fn with_metadata(body: Bytes, metadata: &Metadata) -> Response {
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();

    for (name, value) in metadata {
        if name == header::CONTENT_LENGTH.as_str() {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }

    response
}

fn override_url(upstream: &Option<Extension<UpstreamOverride>>) -> Option<&str> {
    upstream.as_ref().map(|Extension(o)| o.0.as_str())
}

/// GET /gems/{id}
async fn get_gem(
    State(state): State<AppState>,
    upstream: Option<Extension<UpstreamOverride>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    debug!("GET gem: {}", id);

    let fetcher = state.upstreams.select(override_url(&upstream))?;
    let gem = fetcher.fetch(&id).await?;

    Ok(with_metadata(gem.body, &gem.metadata))
}

/// GET /specs.4.8.gz and friends, passed through unchanged
async fn get_index(
    State(state): State<AppState>,
    upstream: Option<Extension<UpstreamOverride>>,
    uri: Uri,
) -> Result<Response, ApiError> {
    debug!("GET index: {}", uri.path());

    let fetcher = state.upstreams.select(override_url(&upstream))?;
    let (body, headers) = fetcher.client().get(uri.path()).await?;

    Ok(with_metadata(body, &filter_headers(&headers)))
}

/// Create gem routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/gems/{id}", get(get_gem))
        .route("/specs.4.8.gz", get(get_index))
        .route("/latest_specs.4.8.gz", get(get_index))
        .route("/prerelease_specs.4.8.gz", get(get_index))
}
