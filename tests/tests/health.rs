//! Tests for health check endpoints.

use axum::http::StatusCode;
use integration_tests::{fixtures, setup::TestContext};

/// /health returns the documented fields
#[tokio::test]
async fn health_endpoint_structure() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let status = body["status"].as_str().unwrap_or("");
    assert!(
        status == "healthy" || status == "degraded",
        "unexpected status '{status}'"
    );
    assert!(body["database_connected"].is_boolean());
    assert!(body["queue_depth"].is_u64());
}

/// Queue depth is zero once the collector has drained
#[tokio::test]
async fn queue_depth_is_zero_after_drain() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server
        .post("/collect/api")
        .json(&fixtures::metrics_payload(vec![fixtures::api_metric("auth")]))
        .await
        .assert_status(StatusCode::ACCEPTED);
    ctx.drain().await;

    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["queue_depth"], 0);
}

/// /health/ready pings the store
#[tokio::test]
async fn ready_reflects_store_ping() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/health/ready").await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["status"], "ok");

    ctx.store.set_ping_fails(true);
    let response = server.get("/health/ready").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "database unavailable");
}

/// /health/live always answers while the process runs
#[tokio::test]
async fn live_endpoint_ok() {
    let ctx = TestContext::new();
    ctx.store.set_ping_fails(true);
    let server = ctx.server();

    server.get("/health/live").await.assert_status_ok();
}
