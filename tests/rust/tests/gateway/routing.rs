//! Allowlist enforcement, payload checks and route resolution

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;
use tests::{requests, upstream, TestConfig, TestGateway};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_allowlist_blocks_unlisted_path() {
    let server = MockServer::start().await;
    let config = TestConfig::new(&server.uri())
        .set("METRICS_ALLOWLIST", "/api/metrics/latest")
        .build();
    let gateway = TestGateway::new(config);

    let response = gateway.send(requests::get("/metrics/history")).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.json(), json!({ "error": "forbidden_path" }));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_allowlist_prefix_cannot_be_escaped_with_dot_segments() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let config = TestConfig::new(&server.uri())
        .set("METRICS_ALLOWLIST", "/api/public/*")
        .build();
    let gateway = TestGateway::new(config);

    let allowed = gateway.send(requests::get("/metrics/api/public/cpu")).await;
    assert_eq!(allowed.status, StatusCode::OK);

    let escaped = gateway
        .send(requests::get("/metrics/api/public/../private/keys"))
        .await;
    assert_eq!(escaped.status, StatusCode::FORBIDDEN);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_ads_allowlist_checked_before_login() {
    let server = MockServer::start().await;
    upstream::login_ok("tok", Some(3600)).mount(&server).await;
    let config = TestConfig::new(&server.uri())
        .set("ADS_ALLOWLIST", "/api/v1/campaigns/*")
        .build();
    let gateway = TestGateway::new(config);

    let response = gateway.send(requests::get("/ads/advertisers")).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(upstream::login_count(&server).await, 0);
}

#[tokio::test]
async fn test_json_routes_reject_other_content_types() {
    let server = MockServer::start().await;
    upstream::login_ok("tok", Some(3600)).mount(&server).await;
    let gateway = TestGateway::new(TestConfig::new(&server.uri()).build());

    let request = requests::authed(Method::POST, "/ads/campaigns")
        .header("content-type", "text/plain")
        .body(Body::from("name=spring"))
        .unwrap();
    let response = gateway.send(request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json(),
        json!({
            "error": "invalid_content_type",
            "message": "Expected application/json for campaign creation"
        })
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_campaign_dates_are_normalized() {
    let server = MockServer::start().await;
    upstream::login_ok("tok", Some(3600)).mount(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/campaigns/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
        .expect(1)
        .mount(&server)
        .await;
    let gateway = TestGateway::new(TestConfig::new(&server.uri()).build());

    let response = gateway
        .send(requests::json(
            Method::POST,
            "/ads/campaigns",
            &json!({
                "name": "Spring",
                "start_date": "2024-03-01",
                "end_date": "2024-03-31T18:00:00Z"
            }),
        ))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.json(), json!({ "id": 7 }));

    let requests = server.received_requests().await.unwrap();
    let forwarded = requests
        .iter()
        .find(|r| r.url.path() == "/api/v1/campaigns/")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&forwarded.body).unwrap();
    assert_eq!(body["start_date"], "2024-03-01T00:00:00Z");
    assert_eq!(body["end_date"], "2024-03-31T18:00:00Z");
    assert_eq!(body["name"], "Spring");
    assert_eq!(
        forwarded.headers.get("authorization").unwrap().to_str().unwrap(),
        "Bearer tok"
    );
}

#[tokio::test]
async fn test_invalid_json_body_is_bad_request() {
    let server = MockServer::start().await;
    let gateway = TestGateway::new(TestConfig::new(&server.uri()).build());

    let request = requests::authed(Method::POST, "/ads/advertisers")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = gateway.send(request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "bad_request");
}

#[tokio::test]
async fn test_raw_upload_requires_multipart() {
    let server = MockServer::start().await;
    let gateway = TestGateway::new(TestConfig::new(&server.uri()).build());

    let missing = requests::authed(Method::POST, "/ads/creatives/upload")
        .body(Body::from("data"))
        .unwrap();
    let response = gateway.send(missing).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["message"], "content-type is required");

    let wrong = requests::authed(Method::POST, "/ads/creatives/upload")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = gateway.send(wrong).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "invalid_content_type");
}

#[tokio::test]
async fn test_raw_upload_forwards_body_and_content_type() {
    let server = MockServer::start().await;
    upstream::login_ok("tok", None).mount(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/creatives/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uploaded": 1 })))
        .mount(&server)
        .await;
    let gateway = TestGateway::new(TestConfig::new(&server.uri()).build());

    let body = "--b\r\nContent-Disposition: form-data; name=\"campaign_id\"\r\n\r\n9\r\n--b--\r\n";
    let request = requests::authed(Method::POST, "/ads/creatives/upload")
        .header("content-type", "multipart/form-data; boundary=b")
        .body(Body::from(body))
        .unwrap();
    let response = gateway.send(request).await;
    assert_eq!(response.status, StatusCode::OK);

    let requests = server.received_requests().await.unwrap();
    let forwarded = requests
        .iter()
        .find(|r| r.url.path() == "/api/v1/creatives/upload")
        .unwrap();
    assert_eq!(forwarded.body, body.as_bytes());
    assert_eq!(
        forwarded.headers.get("content-type").unwrap().to_str().unwrap(),
        "multipart/form-data; boundary=b"
    );
    assert_eq!(
        forwarded.headers.get("content-length").unwrap().to_str().unwrap(),
        body.len().to_string()
    );
}

#[tokio::test]
async fn test_unknown_route_is_protected_not_found() {
    let server = MockServer::start().await;
    let gateway = TestGateway::new(TestConfig::new(&server.uri()).build());

    let anonymous = Request::builder()
        .uri("/nowhere")
        .body(Body::empty())
        .unwrap();
    assert_eq!(gateway.send(anonymous).await.status, StatusCode::UNAUTHORIZED);

    let response = gateway.send(requests::get("/nowhere")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json(), json!({ "error": "not_found" }));
}

#[tokio::test]
async fn test_named_route_with_other_method_is_not_allowed() {
    let server = MockServer::start().await;
    let gateway = TestGateway::new(TestConfig::new(&server.uri()).build());

    let request = requests::authed(Method::DELETE, "/ads/advertisers")
        .body(Body::empty())
        .unwrap();
    let response = gateway.send(request).await;

    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_path_params_are_encoded_as_one_segment() {
    let server = MockServer::start().await;
    upstream::login_ok("tok", None).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/projects/a%2Fb"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "a/b" })))
        .mount(&server)
        .await;
    let gateway = TestGateway::new(TestConfig::new(&server.uri()).build());

    let response = gateway.send(requests::get("/ads/projects/a%2Fb")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({ "name": "a/b" }));
}
