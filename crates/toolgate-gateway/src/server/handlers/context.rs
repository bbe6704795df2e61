//! Key/value context endpoints

use axum::{
    extract::{Path, State},
    response::Json,
};
use bytes::Bytes;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::proxy::payload::parse_json_body;
use crate::server::AppState;

/// `GET /context/{key}`
pub async fn get_context(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>> {
    match state.context_store.get(&key).await? {
        Some(value) => Ok(Json(json!({ "key": key, "value": value }))),
        None => Err(GatewayError::NotFound),
    }
}

/// `PUT /context/{key}` with body `{ "value": <any JSON> }`.
///
/// A body without `value` stores `null`.
pub async fn put_context(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<Json<Value>> {
    let payload = parse_json_body(&body)?;
    let value = payload.get("value").cloned().unwrap_or(Value::Null);

    let stored = state.context_store.set(&key, value).await?;
    debug!("[Context] Stored key {}", key);
    Ok(Json(json!({ "key": key, "value": stored })))
}
