//! Shared test utilities and fixtures for Toolgate integration tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use toolgate_core::{GatewayConfig, ManualClock};
use toolgate_gateway::{DependenciesBuilder, GatewayServer};
use toolgate_storage::{ContextStore, JsonFileContextStore};
use tower::ServiceExt;

/// Caller key registered in every test config
pub const TEST_KEY: &str = "test-key-123";

/// Peer address attached to every request
pub const TEST_PEER: &str = "127.0.0.1:40000";

/// Builder for a config pointing at mock upstreams
pub struct TestConfig {
    vars: HashMap<&'static str, String>,
}

impl TestConfig {
    /// All three upstreams at `upstream_url`, service credentials set,
    /// a generous rate limit
    pub fn new(upstream_url: &str) -> Self {
        let mut vars = HashMap::new();
        vars.insert("TOOL_GATEWAY_API_KEYS", TEST_KEY.to_string());
        vars.insert("SCM_ADS_API_BASE_URL", upstream_url.to_string());
        vars.insert("SCM_METRICS_API_BASE_URL", upstream_url.to_string());
        vars.insert("SCM_POP_API_BASE_URL", upstream_url.to_string());
        vars.insert("ADS_SERVICE_IDENTIFIER", "svc@example.com".to_string());
        vars.insert("ADS_SERVICE_PASSWORD", "hunter2".to_string());
        vars.insert("RATE_LIMIT_MAX", "1000".to_string());
        Self { vars }
    }

    pub fn set(mut self, var: &'static str, value: impl Into<String>) -> Self {
        self.vars.insert(var, value.into());
        self
    }

    pub fn unset(mut self, var: &'static str) -> Self {
        self.vars.remove(var);
        self
    }

    pub fn build(self) -> GatewayConfig {
        GatewayConfig::from_lookup(|key| self.vars.get(key).cloned())
            .expect("test config should parse")
    }
}

/// A gateway router wired to a manual clock and an in-memory context store
pub struct TestGateway {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub store: Arc<JsonFileContextStore>,
}

impl TestGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_store(config, Arc::new(JsonFileContextStore::in_memory()))
    }

    pub fn with_store(config: GatewayConfig, store: Arc<JsonFileContextStore>) -> Self {
        let clock = Arc::new(ManualClock::default());
        let dependencies = DependenciesBuilder::new()
            .with_clock(clock.clone())
            .with_context_store(store.clone() as Arc<dyn ContextStore>)
            .build();
        let server = GatewayServer::new(config, dependencies).expect("gateway should build");
        Self {
            router: server.build_router(),
            clock,
            store,
        }
    }

    /// Send one request through the full middleware stack
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let mut request = request;
        let peer: SocketAddr = TEST_PEER.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Fully buffered router response
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body should be JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// Request builders carrying the test key
pub mod requests {
    use super::*;

    pub fn authed(method: Method, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-api-key", TEST_KEY)
    }

    pub fn get(uri: &str) -> Request<Body> {
        authed(Method::GET, uri).body(Body::empty()).unwrap()
    }

    pub fn json(method: Method, uri: &str, body: &Value) -> Request<Body> {
        authed(method, uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }
}

/// Wiremock helpers for the ads login endpoint
pub mod upstream {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const LOGIN_PATH: &str = "/api/v1/auth/login";

    /// Login succeeding with `token` and an optional lifetime in seconds
    pub fn login_ok(token: &str, expires_in: Option<u64>) -> Mock {
        let body = match expires_in {
            Some(secs) => json!({ "access_token": token, "expires_in": secs }),
            None => json!({ "access_token": token }),
        };
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
    }

    /// Number of login calls the server has seen
    pub async fn login_count(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == LOGIN_PATH)
            .count()
    }
}
