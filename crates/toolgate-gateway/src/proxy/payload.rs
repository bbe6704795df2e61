//! Inbound payload checks and the few rewrites the gateway applies

use axum::http::{header, HeaderMap};
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{GatewayError, Result};

pub const JSON: &str = "application/json";
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

lazy_static! {
    static ref BARE_DATE: Regex = Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap();
}

/// Media type without parameters, lowercased
pub fn media_type(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let media = raw.split(';').next().unwrap_or("").trim();
    (!media.is_empty()).then(|| media.to_ascii_lowercase())
}

/// Reject anything but `application/json` with the given message
pub fn require_json(headers: &HeaderMap, message: &str) -> Result<()> {
    match media_type(headers) {
        Some(media) if media == JSON => Ok(()),
        _ => Err(GatewayError::InvalidContentType(message.to_string())),
    }
}

/// Raw upload bodies must be multipart; a missing header is its own error
pub fn require_multipart(headers: &HeaderMap) -> Result<()> {
    if !headers.contains_key(header::CONTENT_TYPE) {
        return Err(GatewayError::bad_request("content-type is required"));
    }
    match media_type(headers) {
        Some(media) if media == MULTIPART_FORM_DATA => Ok(()),
        _ => Err(GatewayError::InvalidContentType(
            "Expected multipart/form-data for creatives upload".to_string(),
        )),
    }
}

/// Parse a JSON request body. An empty body reads as `{}`.
pub fn parse_json_body(body: &Bytes) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::bad_request(format!("Invalid JSON body: {}", e)))
}

/// `YYYY-MM-DD` becomes midnight UTC; anything else passes through
pub fn normalize_date_time(value: Value) -> Value {
    if let Value::String(s) = &value {
        let trimmed = s.trim();
        if BARE_DATE.is_match(trimmed) {
            return Value::String(format!("{}T00:00:00Z", trimmed));
        }
    }
    value
}

/// Normalize `start_date` and `end_date` of a campaign payload
pub fn normalize_campaign_dates(mut payload: Value) -> Value {
    if let Some(object) = payload.as_object_mut() {
        for field in ["start_date", "end_date"] {
            if let Some(value) = object.get_mut(field) {
                *value = normalize_date_time(value.take());
            }
        }
    }
    payload
}
