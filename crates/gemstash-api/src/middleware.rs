//! Upstream routing prefix middleware
//!
//! Requests of the form `/upstream/<escaped-url>/...` are served from the
//! named upstream. The prefix is stripped before routing and the decoded URL
//! is attached to the request as an [`UpstreamOverride`].

use axum::{
    extract::{Request, State},
    http::{Uri, uri::PathAndQuery},
    middleware::Next,
    response::Response,
};
use gemstash_core::{CoreError, RequestEnv, UPSTREAM_URL_CAPTURE};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Upstream URL requested through the routing prefix
#[derive(Debug, Clone)]
pub struct UpstreamOverride(pub String);

/// Strip the upstream prefix and record the requested upstream
///
/// Must wrap the router rather than be layered onto it, so that routing sees
/// the rewritten URI.
pub async fn rewrite_upstream(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let target = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path(), PathAndQuery::as_str)
        .to_string();
    let mut env = RequestEnv::from_request_target(&target);

    let upstream_url = {
        let mut context = state.upstream_rewriter.for_env(&mut env);
        if !context.matches() {
            return Ok(next.run(request).await);
        }

        let upstream_url = context
            .captures()
            .map_err(CoreError::from)?
            .get(UPSTREAM_URL_CAPTURE)
            .cloned()
            .unwrap_or_default();
        context.rewrite().map_err(CoreError::from)?;
        upstream_url
    };

    let rewritten = if env.request_uri.starts_with('/') {
        env.request_uri
    } else {
        format!("/{}", env.request_uri)
    };
    debug!("Routing {} via upstream {}", rewritten, upstream_url);

    let path_and_query =
        PathAndQuery::try_from(rewritten).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let mut parts = request.uri().clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    *request.uri_mut() = Uri::from_parts(parts).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    request
        .extensions_mut()
        .insert(UpstreamOverride(upstream_url));

    Ok(next.run(request).await)
}
