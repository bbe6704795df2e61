//! HTTP handlers for the gateway server
//!
//! Every protected handler follows the same order: resolve the upstream URL
//! and check it against the allowlist, validate the payload, then (for ads)
//! make sure a session exists, and only then call the upstream.

pub mod ads;
pub mod context;
pub mod metrics;
pub mod pop;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method},
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use serde::Serialize;
use toolgate_core::UpstreamTarget;
use tracing::{debug, warn};

use super::AppState;
use crate::error::{GatewayError, Result};
use crate::proxy::{has_request_body, send_with_session, ProxyQuery};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    debug!("[Gateway] Health check");
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Protected fallback for paths no route claims
pub async fn not_found() -> GatewayError {
    GatewayError::NotFound
}

/// Buffered GET against an upstream that needs no session
pub(crate) async fn relay_get(
    state: &AppState,
    target: UpstreamTarget,
    path: &str,
    raw_query: Option<String>,
) -> Result<Response> {
    let url = state.target_url(target, path, &ProxyQuery::parse(raw_query.as_deref()))?;
    let response = state.client.get(url, None).await?;
    Ok(response.into_response())
}

/// Buffered GET against the ads upstream, with the re-login retry
pub(crate) async fn ads_get(
    state: &AppState,
    path: &str,
    raw_query: Option<String>,
) -> Result<Response> {
    let url = state.target_url(
        UpstreamTarget::Ads,
        path,
        &ProxyQuery::parse(raw_query.as_deref()),
    )?;
    let response = send_with_session(&state.session, |token| {
        let url = url.clone();
        async move { state.client.get(url, Some(&token)).await }
    })
    .await?;
    Ok(response.into_response())
}

/// Buffered request with a body against the ads upstream, with the re-login
/// retry. The body is replayed from the same buffer on retry.
pub(crate) async fn ads_send(
    state: &AppState,
    method: Method,
    url: url::Url,
    content_type: HeaderValue,
    body: Bytes,
) -> Result<Response> {
    let response = send_with_session(&state.session, |token| {
        let method = method.clone();
        let url = url.clone();
        let content_type = content_type.clone();
        let body = body.clone();
        async move {
            state
                .client
                .send_buffered(method, url, Some(&token), Some(&content_type), body)
                .await
        }
    })
    .await?;
    Ok(response.into_response())
}

/// JSON value re-serialized for forwarding
pub(crate) fn json_body(value: &serde_json::Value) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| GatewayError::Internal(e.to_string()))
}

pub(crate) fn json_content_type() -> HeaderValue {
    HeaderValue::from_static("application/json")
}

/// Catch-all pass-through with any method.
///
/// A request body is streamed, never buffered. Against the ads upstream a
/// bodiless request goes through the re-login retry; one with a body is sent
/// once, since a consumed stream cannot be replayed, and a 401/403 to it only
/// refreshes the session for later requests.
pub(crate) async fn pass_through(
    state: &AppState,
    target: UpstreamTarget,
    path: &str,
    raw_query: Option<&str>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Result<Response> {
    let url = state.target_url(target, path, &ProxyQuery::parse(raw_query))?;
    let guarded = target == UpstreamTarget::Ads;

    let response = if has_request_body(&body) {
        let token = if guarded {
            Some(state.session.ensure(false).await?)
        } else {
            None
        };
        let response = state
            .client
            .send_streamed(method, url, token.as_ref(), &headers, body)
            .await?;
        if let Some(token) = token.filter(|_| response.is_auth_rejection()) {
            // Not retried, but the next request must not reuse the rejected token
            if let Err(e) = state.session.force_refresh(&token).await {
                warn!("[Gateway] Re-login after rejected stream failed: {}", e);
            }
        }
        response
    } else if guarded {
        let content_type = headers.get(header::CONTENT_TYPE).cloned();
        send_with_session(&state.session, |token| {
            let method = method.clone();
            let url = url.clone();
            let content_type = content_type.clone();
            async move {
                state
                    .client
                    .send_buffered(method, url, Some(&token), content_type.as_ref(), Bytes::new())
                    .await
            }
        })
        .await?
    } else {
        let content_type = headers.get(header::CONTENT_TYPE);
        state
            .client
            .send_buffered(method, url, None, content_type, Bytes::new())
            .await?
    };
    Ok(response.into_response())
}
