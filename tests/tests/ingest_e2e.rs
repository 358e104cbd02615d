//! End-to-end tests for the ingest pipeline.
//!
//! POST /collect* → rate limiter → handler → BatchCollector → MockSink
//!
//! The MockSink implements the same EventSink trait as PgStore, so every
//! production code path runs except the COPY itself.

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use integration_tests::{
    fixtures,
    setup::{TestContext, TestOptions},
};
use pulse_core::{Category, IngestEvent};

#[tokio::test]
async fn frontend_events_are_enriched_and_flushed() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/collect")
        .add_header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
        .add_header("User-Agent", "Mozilla/5.0 (Test)")
        .json(&fixtures::events_payload(fixtures::frontend_events(5)))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["accepted"], 5);
    assert_eq!(body["rejected"], 0);

    let stats = ctx.drain().await;
    assert_eq!(stats.received, 5);
    assert_eq!(stats.flushed, 5);

    let events = ctx.sink.events_in(Category::Frontend);
    assert_eq!(events.len(), 5);
    for event in events {
        let IngestEvent::Frontend(enriched) = event else {
            panic!("expected a frontend event");
        };
        assert_eq!(enriched.ip, "203.0.113.7");
        assert_eq!(enriched.user_agent, "Mozilla/5.0 (Test)");
        assert_eq!(enriched.event.country.as_deref(), Some(""));
    }
}

#[tokio::test]
async fn client_country_is_kept() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let mut event = fixtures::frontend_event("sess-de");
    event["country"] = "DE".into();

    server
        .post("/collect")
        .json(&fixtures::events_payload(vec![event]))
        .await
        .assert_status(StatusCode::ACCEPTED);

    ctx.drain().await;
    let IngestEvent::Frontend(enriched) = &ctx.sink.events()[0] else {
        panic!("expected a frontend event");
    };
    assert_eq!(enriched.event.country.as_deref(), Some("DE"));
}

#[tokio::test]
async fn every_backend_category_reaches_its_batch() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let requests = [
        ("/collect/api", fixtures::api_metric("auth")),
        ("/collect/psp", fixtures::psp_metric("stripe", true)),
        ("/collect/game", fixtures::game_metric("netent")),
        ("/collect/ws", fixtures::ws_metric("conn-1")),
    ];

    for (path, metric) in requests {
        let response = server
            .post(path)
            .json(&fixtures::metrics_payload(vec![metric.clone(), metric]))
            .await;
        response.assert_status(StatusCode::ACCEPTED);
        assert_eq!(response.json::<serde_json::Value>()["accepted"], 2);
    }

    ctx.drain().await;

    for category in [Category::Api, Category::Psp, Category::Game, Category::WebSocket] {
        assert_eq!(ctx.sink.events_in(category).len(), 2, "{category}");
    }
    assert!(ctx
        .sink
        .batches()
        .iter()
        .all(|b| b.events.iter().all(|e| e.category() == b.category)));
}

#[tokio::test]
async fn invalid_events_are_rejected_individually() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let mut bad = fixtures::api_metric("auth");
    bad["duration_ms"] = (-5.0).into();
    let mut empty_service = fixtures::api_metric("auth");
    empty_service["service_name"] = "".into();

    let response = server
        .post("/collect/api")
        .json(&fixtures::metrics_payload(vec![
            fixtures::api_metric("auth"),
            bad,
            empty_service,
        ]))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["accepted"], 1);
    assert_eq!(body["rejected"], 2);

    let stats = ctx.drain().await;
    assert_eq!(stats.received, 1);
    assert_eq!(ctx.sink.event_count(), 1);
}

#[tokio::test]
async fn stale_and_missing_timestamps_are_replaced() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let recent = Utc::now() - Duration::minutes(10);
    let stale = Utc::now() - Duration::hours(3);
    let mut missing = fixtures::game_metric("pragmatic");
    missing.as_object_mut().unwrap().remove("time");

    let before = Utc::now();
    server
        .post("/collect/game")
        .json(&fixtures::metrics_payload(vec![
            fixtures::at(fixtures::game_metric("netent"), recent),
            fixtures::at(fixtures::game_metric("evolution"), stale),
            missing,
        ]))
        .await
        .assert_status(StatusCode::ACCEPTED);

    ctx.drain().await;

    let times: Vec<_> = ctx
        .sink
        .events()
        .into_iter()
        .map(|e| match e {
            IngestEvent::Game(m) => (m.provider.clone(), m.time),
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(times.len(), 3);

    for (provider, time) in times {
        match provider.as_str() {
            "netent" => assert_eq!(time, recent),
            _ => assert!(time >= before, "{provider} should be re-stamped"),
        }
    }
}

#[tokio::test]
async fn empty_batch_is_accepted() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/collect")
        .json(&serde_json::json!({ "events": [] }))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    assert_eq!(response.json::<serde_json::Value>()["accepted"], 0);

    let response = server.post("/collect/psp").json(&serde_json::json!({})).await;
    response.assert_status(StatusCode::ACCEPTED);
    assert_eq!(response.json::<serde_json::Value>()["accepted"], 0);
}

#[tokio::test]
async fn metrics_endpoint_reports_collector_stats() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server
        .post("/collect/ws")
        .json(&fixtures::metrics_payload(vec![
            fixtures::ws_metric("a"),
            fixtures::ws_metric("b"),
            fixtures::ws_metric("c"),
        ]))
        .await
        .assert_status(StatusCode::ACCEPTED);

    ctx.drain().await;

    let response = server.get("/metrics").await;
    response.assert_status_ok();
    let stats: serde_json::Value = response.json();
    assert_eq!(stats["received"], 3);
    assert_eq!(stats["flushed"], 3);
    assert_eq!(stats["dropped"], 0);
    assert_eq!(stats["failed_events"], 0);
}

#[tokio::test]
async fn sink_failures_are_counted_not_retried() {
    let ctx = TestContext::new();
    ctx.sink.set_should_fail(true);
    let server = ctx.server();

    server
        .post("/collect/api")
        .json(&fixtures::metrics_payload(vec![
            fixtures::api_metric("auth"),
            fixtures::api_metric("wallet"),
        ]))
        .await
        .assert_status(StatusCode::ACCEPTED);

    let stats = ctx.drain().await;
    assert_eq!(stats.failed_events, 2);
    assert!(stats.flush_errors >= 1);
    assert_eq!(stats.flushed, 0);
    assert_eq!(ctx.sink.event_count(), 0);
    assert!(stats.is_balanced());
}

#[tokio::test]
async fn events_after_shutdown_are_dropped() {
    let ctx = TestContext::with_options(TestOptions::default());
    let server = ctx.server();
    ctx.drain().await;

    let response = server
        .post("/collect/api")
        .json(&fixtures::metrics_payload(vec![fixtures::api_metric("auth")]))
        .await;

    // Admission still succeeds; the collector drops and counts the event.
    response.assert_status(StatusCode::ACCEPTED);
    let stats = ctx.collector.stats();
    assert_eq!(stats.received, 1);
    assert_eq!(stats.dropped, 1);
    assert_eq!(ctx.sink.event_count(), 0);
}

#[tokio::test]
async fn many_clients_are_all_accounted_for() {
    let ctx = TestContext::new();
    let server = ctx.server();

    for client in 0..8 {
        for _ in 0..10 {
            server
                .post("/collect/api")
                .add_header("X-Real-IP", format!("198.51.100.{client}"))
                .json(&fixtures::metrics_payload(vec![
                    fixtures::api_metric("auth"),
                    fixtures::api_metric("wallet"),
                ]))
                .await
                .assert_status(StatusCode::ACCEPTED);
        }
    }

    let stats = ctx.drain().await;
    assert_eq!(stats.received, 160);
    assert_eq!(stats.flushed, 160);
    assert!(stats.is_balanced());
    assert_eq!(ctx.sink.event_count(), 160);
}
