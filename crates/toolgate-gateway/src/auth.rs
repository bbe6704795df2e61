//! Caller admission for protected routes
//!
//! A request is admitted when it carries a registered API key and the
//! (key, client address) pair is still within its rate-limit window.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::logging::TraceContext;
use crate::server::AppState;

/// Header carrying the caller key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Client address used when the peer address is not available
pub const UNKNOWN_CLIENT: &str = "unknown";

lazy_static! {
    static ref BEARER: Regex = Regex::new(r"(?i)^Bearer\s+(.+)$").unwrap();
}

/// Caller key from `X-API-Key`, falling back to `Authorization: Bearer`.
///
/// A blank `X-API-Key` counts as absent.
pub fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    let explicit = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(key) = explicit {
        return Some(key.to_string());
    }

    let authorization = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let key = BEARER.captures(authorization)?.get(1)?.as_str().trim();
    (!key.is_empty()).then(|| key.to_string())
}

/// Peer IP of the connection, or `unknown`
pub fn client_address(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Admission middleware: 401 for a missing or unknown key, 429 once the
/// caller's window is exhausted.
pub async fn admission_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let trace_id = request
        .extensions()
        .get::<TraceContext>()
        .map(|ctx| ctx.trace_id.clone())
        .unwrap_or_else(|| "??????".to_string());

    let Some(key) = extract_api_key(request.headers()) else {
        warn!(trace_id = %trace_id, "[Auth] Missing API key");
        return GatewayError::Unauthorized.into_response();
    };

    if !state.config.api_keys.contains(&key) {
        warn!(trace_id = %trace_id, "[Auth] Unknown API key");
        return GatewayError::Unauthorized.into_response();
    }

    let client = client_address(&request);
    if let Err(e) = state.rate_limiter.admit(&key, &client) {
        warn!(trace_id = %trace_id, client = %client, "[Auth] Rate limit exceeded");
        return e.into_response();
    }

    let admitted = request
        .extensions_mut()
        .remove::<TraceContext>()
        .map(|ctx| ctx.with_caller(&key));
    if let Some(ctx) = admitted.clone() {
        request.extensions_mut().insert(ctx);
    }
    debug!(trace_id = %trace_id, client = %client, "[Auth] Admitted");

    let mut response = next.run(request).await;
    // Lets the logging middleware report the caller on the exit line
    if let Some(ctx) = admitted {
        response.extensions_mut().insert(ctx);
    }
    response
}
