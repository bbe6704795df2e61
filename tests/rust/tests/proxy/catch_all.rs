//! Catch-all pass-through routes

use axum::body::Body;
use axum::http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::{requests, upstream, TestConfig, TestGateway};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn gateway(server: &MockServer) -> TestGateway {
    TestGateway::new(TestConfig::new(&server.uri()).build())
}

#[tokio::test]
async fn test_ads_prefix_is_stripped_and_token_attached() {
    let server = MockServer::start().await;
    upstream::login_ok("tok", Some(3600)).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/reports/daily"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rows": [] })))
        .expect(1)
        .mount(&server)
        .await;
    let gateway = gateway(&server).await;

    let response = gateway
        .send(requests::get("/ads/api/v1/reports/daily"))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({ "rows": [] }));
}

#[tokio::test]
async fn test_metrics_prefix_is_stripped_without_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/metrics/hosts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["edge-1"])))
        .expect(1)
        .mount(&server)
        .await;
    let gateway = gateway(&server).await;

    let response = gateway.send(requests::get("/metrics/api/metrics/hosts")).await;

    assert_eq!(response.status, StatusCode::OK);
    let received = server.received_requests().await.unwrap();
    assert!(received[0].headers.get("authorization").is_none());
    assert_eq!(upstream::login_count(&server).await, 0);
}

#[tokio::test]
async fn test_pop_path_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pop/venues/17/plays"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "plays": 4 })))
        .expect(1)
        .mount(&server)
        .await;
    let gateway = gateway(&server).await;

    let response = gateway.send(requests::get("/pop/venues/17/plays")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({ "plays": 4 }));
}

#[tokio::test]
async fn test_any_method_is_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/alerts/9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let gateway = gateway(&server).await;

    let request = requests::authed(Method::DELETE, "/metrics/api/alerts/9")
        .body(Body::empty())
        .unwrap();
    let response = gateway.send(request).await;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_request_body_is_streamed_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pop/import"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "queued": true })))
        .expect(1)
        .mount(&server)
        .await;
    let gateway = gateway(&server).await;

    let csv = "venue,plays\n17,4\n";
    let request = requests::authed(Method::POST, "/pop/import")
        .header("content-type", "text/csv")
        .header("content-length", csv.len())
        .body(Body::from(csv))
        .unwrap();
    let response = gateway.send(request).await;

    assert_eq!(response.status, StatusCode::ACCEPTED);
    let received = server.received_requests().await.unwrap();
    assert_eq!(received[0].body, csv.as_bytes());
    assert_eq!(
        received[0].headers.get("content-type").unwrap().to_str().unwrap(),
        "text/csv"
    );
}

#[tokio::test]
async fn test_streamed_ads_body_carries_token() {
    let server = MockServer::start().await;
    upstream::login_ok("tok", Some(3600)).mount(&server).await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/campaigns/5"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 5 })))
        .expect(1)
        .mount(&server)
        .await;
    let gateway = gateway(&server).await;

    let body = json!({ "name": "Renamed" }).to_string();
    let request = requests::authed(Method::PATCH, "/ads/api/v1/campaigns/5")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .body(Body::from(body.clone()))
        .unwrap();
    let response = gateway.send(request).await;

    assert_eq!(response.status, StatusCode::OK);
    let received = server.received_requests().await.unwrap();
    let forwarded = received
        .iter()
        .find(|r| r.url.path() == "/api/v1/campaigns/5")
        .unwrap();
    assert_eq!(forwarded.body, body.as_bytes());
}

#[tokio::test]
async fn test_body_without_length_headers_is_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pop/ingest"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    let gateway = gateway(&server).await;

    let request = requests::authed(Method::POST, "/pop/ingest")
        .header("content-type", "application/json")
        .body(Body::from("{\"plays\":3}"))
        .unwrap();
    let response = gateway.send(request).await;

    assert_eq!(response.status, StatusCode::ACCEPTED);
    let received = server.received_requests().await.unwrap();
    assert_eq!(received[0].body, b"{\"plays\":3}");
}

#[tokio::test]
async fn test_rejected_stream_refreshes_session() {
    let server = MockServer::start().await;
    upstream::login_ok("stale", Some(3600))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    upstream::login_ok("fresh", Some(3600)).mount(&server).await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/campaigns/5"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/campaigns/5"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 5 })))
        .expect(1)
        .mount(&server)
        .await;
    let gateway = gateway(&server).await;

    let request = requests::authed(Method::PATCH, "/ads/api/v1/campaigns/5")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "name": "Renamed" }).to_string()))
        .unwrap();
    let response = gateway.send(request).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = gateway.send(requests::get("/ads/api/v1/campaigns/5")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(upstream::login_count(&server).await, 2);
}

#[tokio::test]
async fn test_bodiless_ads_call_retries_after_rejection() {
    let server = MockServer::start().await;
    upstream::login_ok("stale", Some(3600))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    upstream::login_ok("fresh", Some(3600)).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/reports"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/reports"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    let gateway = gateway(&server).await;

    let response = gateway.send(requests::get("/ads/api/v1/reports")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(upstream::login_count(&server).await, 2);
}

#[tokio::test]
async fn test_upstream_response_is_relayed_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/export"))
        .respond_with(
            ResponseTemplate::new(418)
                .set_body_raw("host,cpu\nedge-1,0.4\n", "text/csv; charset=utf-8"),
        )
        .mount(&server)
        .await;
    let gateway = gateway(&server).await;

    let response = gateway.send(requests::get("/metrics/api/export")).await;

    assert_eq!(response.status, StatusCode::IM_A_TEAPOT);
    assert_eq!(response.content_type(), Some("text/csv; charset=utf-8"));
    assert_eq!(response.text(), "host,cpu\nedge-1,0.4\n");
}

#[tokio::test]
async fn test_unreachable_upstream_is_upstream_error() {
    let config = TestConfig::new("http://127.0.0.1:9").build();
    let gateway = TestGateway::new(config);

    let response = gateway.send(requests::get("/metrics/latest")).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["error"], "upstream_error");
}
