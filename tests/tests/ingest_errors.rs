//! Tests for error handling in the ingest pipeline.
//!
//! Malformed bodies, oversize payloads, admission control and CORS.

use axum::http::{Method, StatusCode};
use integration_tests::{
    fixtures,
    setup::{TestContext, TestOptions},
};
use telemetry::metrics;

/// Invalid JSON returns VALID_001
#[tokio::test]
async fn invalid_json_returns_400() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/collect")
        .content_type("application/json")
        .bytes("not json at all".into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_001");
}

/// Truncated JSON returns VALID_001 and nothing reaches the collector
#[tokio::test]
async fn truncated_json_returns_400() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/collect/api")
        .content_type("application/json")
        .bytes(r#"{"metrics": [{"service_name": "auth", "#.into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<serde_json::Value>()["code"], "VALID_001");

    let stats = ctx.drain().await;
    assert_eq!(stats.received, 0);
}

/// Wrong field types fail the whole batch
#[tokio::test]
async fn wrong_types_return_400() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/collect/psp")
        .json(&serde_json::json!({ "metrics": "not-a-list" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<serde_json::Value>()["code"], "VALID_001");
}

/// Bodies over the configured cap return 413 with BODY_001
#[tokio::test]
async fn oversize_body_returns_413() {
    let ctx = TestContext::with_options(TestOptions::default().with_max_body_size(1024));
    let server = ctx.server();

    let events = fixtures::frontend_events(50);
    let response = server
        .post("/collect")
        .json(&fixtures::events_payload(events))
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.json::<serde_json::Value>()["code"], "BODY_001");
    assert_eq!(ctx.drain().await.received, 0);
}

/// Requests over the burst get 429 with Retry-After
#[tokio::test]
async fn rate_limited_requests_return_429() {
    let ctx = TestContext::with_options(TestOptions::default().with_rate_limit(0.01, 3));
    let server = ctx.server();
    let payload = fixtures::metrics_payload(vec![fixtures::api_metric("auth")]);
    let limited_before = metrics().rate_limited_requests.get();

    for _ in 0..3 {
        server
            .post("/collect/api")
            .add_header("X-Forwarded-For", "203.0.113.50")
            .json(&payload)
            .await
            .assert_status(StatusCode::ACCEPTED);
    }

    let response = server
        .post("/collect/api")
        .add_header("X-Forwarded-For", "203.0.113.50")
        .json(&payload)
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.header("retry-after"), "1");
    assert_eq!(response.json::<serde_json::Value>()["code"], "RATE_001");
    assert!(metrics().rate_limited_requests.get() > limited_before);

    assert_eq!(ctx.drain().await.received, 3);
}

/// Each client IP has its own bucket
#[tokio::test]
async fn rate_limit_is_per_ip() {
    let ctx = TestContext::with_options(TestOptions::default().with_rate_limit(0.01, 1));
    let server = ctx.server();
    let payload = fixtures::metrics_payload(vec![fixtures::game_metric("netent")]);

    for ip in ["198.51.100.1", "198.51.100.2", "198.51.100.3"] {
        server
            .post("/collect/game")
            .add_header("X-Real-IP", ip)
            .json(&payload)
            .await
            .assert_status(StatusCode::ACCEPTED);
    }

    server
        .post("/collect/game")
        .add_header("X-Real-IP", "198.51.100.1")
        .json(&payload)
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    assert_eq!(ctx.rate_limiter.len(), 3);
}

/// Only ingestion routes are rate limited
#[tokio::test]
async fn health_and_dashboard_are_not_rate_limited() {
    let ctx = TestContext::with_options(TestOptions::default().with_rate_limit(0.01, 1));
    let server = ctx.server();

    for _ in 0..5 {
        server.get("/health/live").await.assert_status_ok();
        server.get("/api/metrics/overview").await.assert_status_ok();
    }
    assert!(ctx.rate_limiter.is_empty());
}

/// Preflight requests get the CORS policy
#[tokio::test]
async fn preflight_allows_any_origin_by_default() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .method(Method::OPTIONS, "/collect")
        .add_header("Origin", "https://casino.example")
        .add_header("Access-Control-Request-Method", "POST")
        .add_header("Access-Control-Request-Headers", "content-type")
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("access-control-allow-origin"), "*");
    assert_eq!(response.header("access-control-max-age"), "86400");
}

/// Configured origins are echoed back; others get no allow-origin header
#[tokio::test]
async fn preflight_respects_origin_list() {
    let ctx = TestContext::with_options(
        TestOptions::default().with_allowed_origins(&["https://casino.example"]),
    );
    let server = ctx.server();

    let allowed = server
        .method(Method::OPTIONS, "/collect")
        .add_header("Origin", "https://casino.example")
        .add_header("Access-Control-Request-Method", "POST")
        .await;
    assert_eq!(
        allowed.header("access-control-allow-origin"),
        "https://casino.example"
    );

    let denied = server
        .method(Method::OPTIONS, "/collect")
        .add_header("Origin", "https://evil.example")
        .add_header("Access-Control-Request-Method", "POST")
        .await;
    assert!(denied
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}
