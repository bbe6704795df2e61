//! Upstream calls and response relay
//!
//! Responses are always buffered in full and relayed with the upstream's
//! status, content type and body bytes. Request bodies are either buffered
//! (replayable, so eligible for the re-login retry) or streamed straight from
//! the caller.

use std::future::Future;
use std::time::Duration;

use axum::{
    body::{Body, HttpBody},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{debug, info};
use url::Url;

use crate::error::Result;
use crate::session::{SessionToken, UpstreamSession};

/// Content type relayed when the upstream sends none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Buffered upstream response
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: HeaderValue,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub async fn read(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        let body = response.bytes().await?;
        Ok(Self {
            status,
            content_type,
            body,
        })
    }

    /// 401 or 403: the token may have been revoked upstream
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
    }

    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body,
        )
            .into_response()
    }
}

/// HTTP client shared by every upstream call
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
}

impl UpstreamClient {
    /// Build a client, optionally bounding every upstream call
    pub fn new(timeout: Option<Duration>) -> reqwest::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("toolgate/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
        })
    }

    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Send a prepared request and buffer the response
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<UpstreamResponse> {
        let response = request.send().await?;
        UpstreamResponse::read(response).await
    }

    /// Buffered GET
    pub async fn get(&self, url: Url, token: Option<&SessionToken>) -> Result<UpstreamResponse> {
        debug!("[Gateway] GET {}", url);
        let mut request = self.http.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token.token());
        }
        self.send(request).await
    }

    /// Request with a buffered body
    pub async fn send_buffered(
        &self,
        method: Method,
        url: Url,
        token: Option<&SessionToken>,
        content_type: Option<&HeaderValue>,
        body: Bytes,
    ) -> Result<UpstreamResponse> {
        debug!("[Gateway] {} {} ({} bytes)", method, url, body.len());
        let mut request = self.http.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token.token());
        }
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type.clone());
        }
        if !body.is_empty() {
            request = request
                .header(header::CONTENT_LENGTH, body.len())
                .body(body);
        }
        self.send(request).await
    }

    /// Pass-through with the caller's body streamed as it arrives.
    ///
    /// Content type and declared length are copied from the inbound headers.
    pub async fn send_streamed(
        &self,
        method: Method,
        url: Url,
        token: Option<&SessionToken>,
        inbound: &HeaderMap,
        body: Body,
    ) -> Result<UpstreamResponse> {
        debug!("[Gateway] {} {} (streamed)", method, url);
        let mut request = self.http.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token.token());
        }
        for name in [header::CONTENT_TYPE, header::CONTENT_LENGTH] {
            if let Some(value) = inbound.get(&name) {
                request = request.header(name, value.clone());
            }
        }
        let body = reqwest::Body::wrap_stream(body.into_data_stream());
        self.send(request.body(body)).await
    }
}

/// Whether the inbound request carries a body that would need streaming.
/// Decided from the body, so a chunked body without framing headers counts.
pub fn has_request_body(body: &Body) -> bool {
    !body.is_end_stream()
}

/// Run a token-guarded call: ensure a session, send, and on 401/403 force a
/// re-login and send exactly once more. The second response is relayed as is.
pub async fn send_with_session<F, Fut>(
    session: &UpstreamSession,
    mut send: F,
) -> Result<UpstreamResponse>
where
    F: FnMut(SessionToken) -> Fut,
    Fut: Future<Output = Result<UpstreamResponse>>,
{
    let token = session.ensure(false).await?;
    let first = send(token.clone()).await?;
    if !first.is_auth_rejection() {
        return Ok(first);
    }

    info!(
        "[Gateway] Upstream answered {}, re-authenticating and retrying once",
        first.status.as_u16()
    );
    let fresh = session.force_refresh(&token).await?;
    send(fresh).await
}
