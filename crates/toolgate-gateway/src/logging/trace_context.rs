//! Trace Context - Request correlation and structured logging
//!
//! Generates unique trace IDs and provides structured spans for request tracing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::{info, info_span, warn, Span};

/// Global request counter for trace ID generation
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a short, unique trace ID for this request
/// Format: 6 hex characters (e.g., "a1b2c3")
pub fn generate_trace_id() -> String {
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let timestamp = chrono::Utc::now().timestamp_micros() as u64;

    // Odd multiplier keeps consecutive counters distinct after masking
    let mixed = timestamp.wrapping_add(counter.wrapping_mul(0x9E37_79B9));
    format!("{:06x}", mixed & 0xFFFFFF)
}

/// Trace context for a single request
#[derive(Debug, Clone)]
pub struct TraceContext {
    /// Unique trace ID (6 hex chars)
    pub trace_id: String,
    pub method: String,
    pub path: String,
    /// Redacted caller key, set once admission succeeds
    pub caller: Option<String>,
    pub started_at: Instant,
}

impl TraceContext {
    /// Create a new trace context for an incoming request
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            trace_id: generate_trace_id(),
            method: method.to_string(),
            path: path.to_string(),
            caller: None,
            started_at: Instant::now(),
        }
    }

    /// Attach the admitted caller (only a short prefix is kept)
    pub fn with_caller(mut self, api_key: &str) -> Self {
        self.caller = Some(redact_key(api_key));
        self
    }

    /// Get elapsed time since request started
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn short_caller(&self) -> &str {
        self.caller.as_deref().unwrap_or("anon")
    }
}

/// First four characters of a key followed by an ellipsis
fn redact_key(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{}…", prefix)
}

/// Request span builder for structured logging
pub struct RequestSpan;

impl RequestSpan {
    /// Create a tracing span for an incoming request
    ///
    /// This span will automatically include trace_id in all child logs.
    pub fn enter(ctx: &TraceContext) -> Span {
        info_span!(
            "request",
            trace_id = %ctx.trace_id,
            method = %ctx.method,
            path = %ctx.path,
        )
    }

    /// Log request entry (single consolidated line)
    pub fn log_entry(ctx: &TraceContext) {
        info!(trace_id = %ctx.trace_id, "→ {} {}", ctx.method, ctx.path);
    }

    /// Log request completion (single consolidated line)
    pub fn log_exit(ctx: &TraceContext, status: u16) {
        let elapsed = ctx.elapsed_ms();
        if status >= 500 {
            warn!(
                trace_id = %ctx.trace_id,
                "← {} caller={} ({}ms)",
                status,
                ctx.short_caller(),
                elapsed
            );
        } else {
            info!(
                trace_id = %ctx.trace_id,
                "← {} caller={} ({}ms)",
                status,
                ctx.short_caller(),
                elapsed
            );
        }
    }
}
