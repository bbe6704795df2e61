//! HTTP Request/Response Logging Middleware
//!
//! Centralized logging with trace IDs for request correlation. Bodies are
//! never read here, so streamed request bodies reach the handlers untouched.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderName},
    middleware::Next,
    response::Response,
};
use tracing::{debug, Instrument};

use crate::logging::{RequestSpan, TraceContext};

/// Headers that should be redacted
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

/// Headers worth showing at DEBUG level
const LOGGED_HEADERS: &[&str] = &[
    "content-type",
    "content-length",
    "transfer-encoding",
    "accept",
    "user-agent",
    "authorization",
    "x-api-key",
];

fn is_sensitive_header(name: &HeaderName) -> bool {
    SENSITIVE_HEADERS.contains(&name.as_str())
}

/// Redact sensitive headers (compact format for DEBUG)
pub fn redact_headers_compact(headers: &HeaderMap) -> String {
    headers
        .iter()
        .filter(|(name, _)| LOGGED_HEADERS.contains(&name.as_str()))
        .map(|(name, value)| {
            if is_sensitive_header(name) {
                format!("{}=[REDACTED]", name)
            } else {
                format!("{}={:?}", name, value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Logging middleware for requests and responses
///
/// Generates a trace_id and logs a single entry/exit line per request.
pub async fn http_logging_middleware(mut request: Request, next: Next) -> Response {
    let ctx = TraceContext::new(request.method().as_str(), request.uri().path());
    let span = RequestSpan::enter(&ctx);

    async move {
        RequestSpan::log_entry(&ctx);
        debug!(
            trace_id = %ctx.trace_id,
            headers = %redact_headers_compact(request.headers()),
            "Request headers"
        );

        request.extensions_mut().insert(ctx.clone());
        let response = next.run(request).await;

        // Admission puts the context back with the caller attached
        let exit_ctx = response.extensions().get::<TraceContext>().unwrap_or(&ctx);
        RequestSpan::log_exit(exit_ctx, response.status().as_u16());

        response
    }
    .instrument(span)
    .await
}
