//! Request-path error taxonomy
//!
//! Every failure a handler can produce maps to one status code and a JSON body
//! of the form `{ "error": <code>, "message"?: <text>, "details"?: <text> }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use toolgate_storage::ContextStoreError;
use tracing::{error, warn};

/// Gateway result alias
pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("rate limited")]
    RateLimited,

    #[error("path not allowed: {0}")]
    ForbiddenPath(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    InvalidContentType(String),

    #[error("{message}")]
    DownloadFailed {
        message: String,
        details: Option<String>,
    },

    #[error("File exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("not found")]
    NotFound,

    #[error("invalid key")]
    InvalidKey,

    /// Login against the token-guarded upstream failed
    #[error("{message}")]
    UpstreamAuth {
        message: String,
        details: Option<String>,
    },

    /// Forwarded call failed before a response could be relayed
    #[error("{message}")]
    Upstream {
        message: String,
        details: Option<String>,
    },

    #[error("{0}")]
    Internal(String),
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl GatewayError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            details: None,
        }
    }

    pub fn upstream_auth(message: impl Into<String>, details: Option<String>) -> Self {
        Self::UpstreamAuth {
            message: message.into(),
            details,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::ForbiddenPath(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_)
            | Self::InvalidContentType(_)
            | Self::DownloadFailed { .. }
            | Self::InvalidKey => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::UpstreamAuth { .. } | Self::Upstream { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate_limited",
            Self::ForbiddenPath(_) => "forbidden_path",
            Self::BadRequest(_) => "bad_request",
            Self::InvalidContentType(_) => "invalid_content_type",
            Self::DownloadFailed { .. } => "download_failed",
            Self::PayloadTooLarge { .. } => "file_too_large",
            Self::NotFound => "not_found",
            Self::InvalidKey => "invalid_key",
            Self::UpstreamAuth { .. } => "upstream_auth_error",
            Self::Upstream { .. } => "upstream_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Human-readable message, omitted for self-describing codes
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Unauthorized | Self::RateLimited | Self::ForbiddenPath(_) | Self::NotFound => {
                None
            }
            other => Some(other.to_string()),
        }
    }

    pub fn details(&self) -> Option<&str> {
        match self {
            Self::DownloadFailed { details, .. }
            | Self::UpstreamAuth { details, .. }
            | Self::Upstream { details, .. } => details.as_deref(),
            _ => None,
        }
    }

    /// Failures of the caller's own request, as opposed to gateway or upstream faults
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code(),
            message: self.message(),
            details: self.details().map(String::from),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("[Gateway] {} ({}): {}", status.as_u16(), self.code(), self);
        } else if let Self::ForbiddenPath(path) = &self {
            warn!("[Gateway] Blocked upstream path {}", path);
        }
        (status, Json(self.body())).into_response()
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        Self::upstream(e.to_string())
    }
}

impl From<ContextStoreError> for GatewayError {
    fn from(e: ContextStoreError) -> Self {
        match e {
            ContextStoreError::InvalidKey => Self::InvalidKey,
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Truncate to at most `max` characters
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
