//! Request logging infrastructure
//!
//! Provides structured logging with:
//! - Short trace IDs for request correlation
//! - One entry and one exit line per request
//! - Redacted caller identity

mod trace_context;

pub use trace_context::{generate_trace_id, RequestSpan, TraceContext};
