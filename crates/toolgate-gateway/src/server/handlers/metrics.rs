//! Metrics upstream routes

use axum::{
    body::Body,
    extract::{RawQuery, State},
    http::{HeaderMap, Method, Uri},
    response::Response,
};
use toolgate_core::UpstreamTarget;

use super::{pass_through, relay_get};
use crate::error::Result;
use crate::server::AppState;

pub async fn latest(State(state): State<AppState>, RawQuery(query): RawQuery) -> Result<Response> {
    relay_get(&state, UpstreamTarget::Metrics, "/api/metrics/latest", query).await
}

pub async fn history(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    relay_get(&state, UpstreamTarget::Metrics, "/api/metrics/history", query).await
}

/// Catch-all: `/metrics/<rest>` goes to `/<rest>` on the metrics upstream
pub async fn proxy_any(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Result<Response> {
    let path = uri.path().strip_prefix("/metrics").unwrap_or_default();
    pass_through(
        &state,
        UpstreamTarget::Metrics,
        path,
        uri.query(),
        method,
        headers,
        body,
    )
    .await
}
