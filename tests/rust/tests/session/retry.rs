//! Re-login and retry on upstream auth rejection

use axum::http::{Method, StatusCode};
use serde_json::json;
use tests::{requests, upstream, TestConfig, TestGateway};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// First login yields `stale`, every later one `fresh`
async fn rotating_login(server: &MockServer) {
    upstream::login_ok("stale", Some(3600))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(server)
        .await;
    upstream::login_ok("fresh", Some(3600)).mount(server).await;
}

fn calls_to(received: &[wiremock::Request], target: &str) -> usize {
    received.iter().filter(|r| r.url.path() == target).count()
}

#[tokio::test]
async fn test_rejected_token_triggers_one_relogin() {
    let server = MockServer::start().await;
    rotating_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/campaigns/"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/campaigns/"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 3 }])))
        .mount(&server)
        .await;
    let gateway = TestGateway::new(TestConfig::new(&server.uri()).build());

    let response = gateway.send(requests::get("/ads/campaigns")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!([{ "id": 3 }]));
    let received = server.received_requests().await.unwrap();
    assert_eq!(calls_to(&received, upstream::LOGIN_PATH), 2);
    assert_eq!(calls_to(&received, "/api/v1/campaigns/"), 2);

    // The refreshed token is kept for later requests
    gateway.send(requests::get("/ads/campaigns")).await;
    assert_eq!(upstream::login_count(&server).await, 2);
}

#[tokio::test]
async fn test_second_rejection_is_relayed() {
    let server = MockServer::start().await;
    upstream::login_ok("tok", Some(3600)).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/venues/"))
        .respond_with(
            ResponseTemplate::new(403).set_body_raw("nope", "text/plain"),
        )
        .mount(&server)
        .await;
    let gateway = TestGateway::new(TestConfig::new(&server.uri()).build());

    let response = gateway.send(requests::get("/ads/venues")).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.text(), "nope");
    assert_eq!(response.content_type(), Some("text/plain"));
    let received = server.received_requests().await.unwrap();
    assert_eq!(calls_to(&received, upstream::LOGIN_PATH), 2);
    assert_eq!(calls_to(&received, "/api/v1/venues/"), 2);
}

#[tokio::test]
async fn test_retry_replays_json_body() {
    let server = MockServer::start().await;
    rotating_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/advertisers/"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/advertisers/"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 11 })))
        .mount(&server)
        .await;
    let gateway = TestGateway::new(TestConfig::new(&server.uri()).build());

    let response = gateway
        .send(requests::json(
            Method::POST,
            "/ads/advertisers",
            &json!({ "name": "Acme" }),
        ))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);

    let received = server.received_requests().await.unwrap();
    let bodies: Vec<serde_json::Value> = received
        .iter()
        .filter(|r| r.url.path() == "/api/v1/advertisers/")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(bodies, vec![json!({ "name": "Acme" }); 2]);
}

#[tokio::test]
async fn test_other_errors_are_not_retried() {
    let server = MockServer::start().await;
    upstream::login_ok("tok", Some(3600)).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/devices/"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({ "detail": "down" })))
        .mount(&server)
        .await;
    let gateway = TestGateway::new(TestConfig::new(&server.uri()).build());

    let response = gateway.send(requests::get("/ads/devices")).await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.json(), json!({ "detail": "down" }));
    let received = server.received_requests().await.unwrap();
    assert_eq!(calls_to(&received, upstream::LOGIN_PATH), 1);
    assert_eq!(calls_to(&received, "/api/v1/devices/"), 1);
}

#[tokio::test]
async fn test_login_failure_is_upstream_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(upstream::LOGIN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;
    let gateway = TestGateway::new(TestConfig::new(&server.uri()).build());

    let response = gateway.send(requests::get("/ads/advertisers")).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.json();
    assert_eq!(body["error"], "upstream_auth_error");
    assert_eq!(body["message"], "Ads login failed: HTTP 401 Unauthorized");
    assert_eq!(body["details"], "bad credentials");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
}

#[tokio::test]
async fn test_login_without_token_is_upstream_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(upstream::LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token_type": "bearer" })))
        .mount(&server)
        .await;
    let gateway = TestGateway::new(TestConfig::new(&server.uri()).build());

    let response = gateway.send(requests::get("/ads/advertisers")).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["error"], "upstream_auth_error");
}

#[tokio::test]
async fn test_missing_credentials_fail_before_any_call() {
    let server = MockServer::start().await;
    let config = TestConfig::new(&server.uri())
        .unset("ADS_SERVICE_PASSWORD")
        .build();
    let gateway = TestGateway::new(config);

    let response = gateway.send(requests::get("/ads/advertisers")).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["error"], "upstream_auth_error");
    assert!(server.received_requests().await.unwrap().is_empty());
}
