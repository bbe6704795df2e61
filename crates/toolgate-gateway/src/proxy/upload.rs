//! Upload-by-URL: download a remote file and re-post it to the ads upstream
//! as multipart/form-data.
//!
//! The bulk variant isolates failures per item and reports results in input
//! order even though items run concurrently.

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use bytes::{Bytes, BytesMut};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::forwarder::{send_with_session, UpstreamClient, UpstreamResponse, DEFAULT_CONTENT_TYPE};
use super::multipart::MultipartBuilder;
use crate::error::{truncate_chars, GatewayError, Result};
use crate::session::UpstreamSession;

/// Largest remote file accepted (25 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

/// Most URLs accepted by one bulk request
pub const MAX_BULK_ITEMS: usize = 20;

/// Form field carrying the file
pub const FILE_FIELD: &str = "files";

/// Upstream endpoint receiving creatives
pub const UPLOAD_PATH: &str = "/api/v1/creatives/upload";

const DOWNLOAD_DETAILS_MAX_CHARS: usize = 500;
const UPSTREAM_DETAILS_MAX_CHARS: usize = 2000;

/// Body of `POST /ads/creatives/uploadByUrl`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadByUrlRequest {
    pub campaign_id: Option<Value>,
    pub selected_days: Option<Value>,
    pub time_slots: Option<Value>,
    pub devices: Option<Value>,
    pub file_url: Option<Value>,
}

/// Body of `POST /ads/creatives/uploadByUrls`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadByUrlsRequest {
    pub campaign_id: Option<Value>,
    pub selected_days: Option<Value>,
    pub time_slots: Option<Value>,
    pub devices: Option<Value>,
    pub file_urls: Option<Value>,
}

/// Form fields sent alongside every uploaded file
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFields {
    pub campaign_id: Value,
    pub selected_days: Value,
    pub time_slots: Value,
    pub devices: Option<Value>,
}

impl UploadFields {
    /// Fields in wire order; null or absent values are skipped
    pub fn form_values(&self) -> Vec<(&'static str, String)> {
        [
            ("campaign_id", Some(&self.campaign_id)),
            ("selected_days", Some(&self.selected_days)),
            ("time_slots", Some(&self.time_slots)),
            ("devices", self.devices.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| form_value(value?).map(|v| (name, v)))
        .collect()
    }
}

/// Arrays are joined with commas into a single value
pub fn form_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

/// Missing, null, false, zero and empty strings count as not provided
fn is_provided(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

impl UploadByUrlRequest {
    /// Check required fields; returns the form fields and the file URL
    pub fn validate(self) -> Result<(UploadFields, Value)> {
        let provided = [
            self.campaign_id.as_ref(),
            self.selected_days.as_ref(),
            self.time_slots.as_ref(),
            self.file_url.as_ref(),
        ]
        .into_iter()
        .all(is_provided);
        if !provided {
            return Err(GatewayError::bad_request(
                "campaign_id, selected_days, time_slots, and file_url are required",
            ));
        }

        let file_url = self.file_url.unwrap_or(Value::Null);
        parse_http_url(&file_url)?;

        Ok((
            UploadFields {
                campaign_id: self.campaign_id.unwrap_or(Value::Null),
                selected_days: self.selected_days.unwrap_or(Value::Null),
                time_slots: self.time_slots.unwrap_or(Value::Null),
                devices: self.devices,
            },
            file_url,
        ))
    }
}

impl UploadByUrlsRequest {
    /// Check required fields and the list bounds; returns the form fields
    /// and the file URLs as given
    pub fn validate(self) -> Result<(UploadFields, Vec<Value>)> {
        let provided = [
            self.campaign_id.as_ref(),
            self.selected_days.as_ref(),
            self.time_slots.as_ref(),
            self.file_urls.as_ref(),
        ]
        .into_iter()
        .all(is_provided);
        if !provided {
            return Err(GatewayError::bad_request(
                "campaign_id, selected_days, time_slots, and file_urls are required",
            ));
        }

        let file_urls = match self.file_urls {
            Some(Value::Array(items)) if !items.is_empty() => items,
            _ => {
                return Err(GatewayError::bad_request(
                    "file_urls must be a non-empty array",
                ))
            }
        };
        if file_urls.len() > MAX_BULK_ITEMS {
            return Err(GatewayError::bad_request(format!(
                "file_urls max is {}",
                MAX_BULK_ITEMS
            )));
        }

        Ok((
            UploadFields {
                campaign_id: self.campaign_id.unwrap_or(Value::Null),
                selected_days: self.selected_days.unwrap_or(Value::Null),
                time_slots: self.time_slots.unwrap_or(Value::Null),
                devices: self.devices,
            },
            file_urls,
        ))
    }
}

/// Accept only absolute http(s) URLs
pub fn parse_http_url(value: &Value) -> Result<Url> {
    value
        .as_str()
        .and_then(|s| Url::parse(s).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .ok_or_else(|| GatewayError::bad_request("file_url must be http(s)"))
}

/// Last non-empty path segment, or `upload`
pub fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.trim().is_empty()).last())
        .unwrap_or("upload")
        .to_string()
}

/// A downloaded remote file
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Outcome of one item of a bulk upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    /// The URL exactly as the caller sent it
    pub file_url: Value,
    pub ok: bool,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl UploadResult {
    fn failed(file_url: Value, status: u16, error: &str, message: String) -> Self {
        Self {
            file_url,
            ok: false,
            status,
            result: None,
            error: Some(error.to_string()),
            message: Some(message),
            details: None,
        }
    }

    /// Classify an item outcome
    pub fn from_outcome(file_url: Value, outcome: Result<UpstreamResponse>) -> Self {
        match outcome {
            Ok(response) if response.status.is_success() => {
                let text = response.text_lossy();
                let result =
                    serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
                Self {
                    file_url,
                    ok: true,
                    status: response.status.as_u16(),
                    result: Some(result),
                    error: None,
                    message: None,
                    details: None,
                }
            }
            Ok(response) => Self {
                details: Some(truncate_chars(
                    &response.text_lossy(),
                    UPSTREAM_DETAILS_MAX_CHARS,
                )),
                ..Self::failed(
                    file_url,
                    response.status.as_u16(),
                    "upstream_error",
                    format!("Ads upload failed: HTTP {}", response.status),
                )
            },
            Err(e) if e.is_client_error() => Self {
                details: e.details().map(String::from),
                ..Self::failed(file_url, e.status().as_u16(), e.code(), e.to_string())
            },
            Err(e) => Self::failed(file_url, 500, "exception", e.to_string()),
        }
    }
}

/// Downloads remote files and posts them to the creatives endpoint
#[derive(Clone)]
pub struct CreativeUploader {
    client: UpstreamClient,
    session: Arc<UpstreamSession>,
    max_bytes: u64,
}

impl CreativeUploader {
    pub fn new(client: UpstreamClient, session: Arc<UpstreamSession>) -> Self {
        Self {
            client,
            session,
            max_bytes: MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Fetch a remote file, enforcing the size ceiling on both the declared
    /// length and the bytes actually received
    pub async fn download(&self, url: &Url) -> Result<RemoteFile> {
        debug!("[Upload] Downloading {}", url);
        let mut response = self.client.http().get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::DownloadFailed {
                message: format!("Failed to download file_url: HTTP {}", status),
                details: Some(truncate_chars(&text, DOWNLOAD_DETAILS_MAX_CHARS)),
            });
        }

        let limit = self.max_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(GatewayError::PayloadTooLarge { limit });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let mut buf = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            if (buf.len() + chunk.len()) as u64 > limit {
                return Err(GatewayError::PayloadTooLarge { limit });
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(RemoteFile {
            filename: filename_from_url(url),
            content_type,
            bytes: buf.freeze(),
        })
    }

    /// Download one file and upload it to `target` with the given fields
    pub async fn upload_from_url(
        &self,
        target: &Url,
        fields: &UploadFields,
        file_url: &Value,
    ) -> Result<UpstreamResponse> {
        let url = parse_http_url(file_url)?;
        let file = self.download(&url).await?;

        let mut builder = MultipartBuilder::new();
        for (name, value) in fields.form_values() {
            builder = builder.text(name, &value);
        }
        let multipart = builder
            .file(FILE_FIELD, &file.filename, &file.content_type, &file.bytes)
            .finish();

        let content_type = HeaderValue::from_str(&multipart.content_type())
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        let body = multipart.bytes();

        info!(
            "[Upload] Uploading {} ({} bytes) to {}",
            file.filename,
            file.bytes.len(),
            target
        );
        send_with_session(&self.session, |token| {
            let body = body.clone();
            let content_type = content_type.clone();
            let target = target.clone();
            async move {
                self.client
                    .send_buffered(Method::POST, target, Some(&token), Some(&content_type), body)
                    .await
            }
        })
        .await
    }

    /// Upload every URL with at most `concurrency` in flight.
    ///
    /// One result per input, in input order. No item failure escapes.
    pub async fn upload_from_urls(
        &self,
        target: &Url,
        fields: &UploadFields,
        file_urls: Vec<Value>,
        concurrency: usize,
    ) -> Vec<UploadResult> {
        let total = file_urls.len();
        let results: Vec<UploadResult> = stream::iter(file_urls)
            .map(|file_url| async move {
                let outcome = self.upload_from_url(target, fields, &file_url).await;
                UploadResult::from_outcome(file_url, outcome)
            })
            .buffered(concurrency.max(1))
            .collect()
            .await;

        let failed = results.iter().filter(|r| !r.ok).count();
        if failed > 0 {
            warn!("[Upload] Bulk upload: {} of {} items failed", failed, total);
        } else {
            info!("[Upload] Bulk upload: {} items uploaded", total);
        }
        results
    }
}
