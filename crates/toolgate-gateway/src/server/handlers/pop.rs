//! Proof-of-play upstream routes. Paths are forwarded unchanged.

use axum::{
    body::Body,
    extract::{RawQuery, State},
    http::{header, HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use toolgate_core::UpstreamTarget;

use super::{pass_through, relay_get};
use crate::error::Result;
use crate::proxy::ProxyQuery;
use crate::server::AppState;

pub async fn list(State(state): State<AppState>, RawQuery(query): RawQuery) -> Result<Response> {
    relay_get(&state, UpstreamTarget::Pop, "/pop", query).await
}

/// Delete records. The body is forwarded with its content type.
pub async fn delete(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let url = state.target_url(
        UpstreamTarget::Pop,
        "/pop",
        &ProxyQuery::parse(query.as_deref()),
    )?;
    let response = state
        .client
        .send_buffered(
            Method::DELETE,
            url,
            None,
            headers.get(header::CONTENT_TYPE),
            body,
        )
        .await?;
    Ok(response.into_response())
}

pub async fn search(State(state): State<AppState>, RawQuery(query): RawQuery) -> Result<Response> {
    relay_get(&state, UpstreamTarget::Pop, "/pop/search", query).await
}

pub async fn stats(State(state): State<AppState>, RawQuery(query): RawQuery) -> Result<Response> {
    relay_get(&state, UpstreamTarget::Pop, "/pop/stats", query).await
}

pub async fn impressions(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    relay_get(&state, UpstreamTarget::Pop, "/pop/impressions", query).await
}

/// Catch-all: `/pop/<rest>` keeps its full path on the pop upstream
pub async fn proxy_any(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Result<Response> {
    pass_through(
        &state,
        UpstreamTarget::Pop,
        uri.path(),
        uri.query(),
        method,
        headers,
        body,
    )
    .await
}
