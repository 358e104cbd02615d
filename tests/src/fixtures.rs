//! Test fixtures and payload builders.

use chrono::{DateTime, Utc};
use pulse_core::{
    enrich_frontend, ApiMetric, FrontendEvent, GameMetric, IngestEvent, PspMetric,
    WebSocketMetric,
};
use serde_json::{json, Value};

/// A frontend web vitals event.
pub fn frontend_event(session_id: &str) -> Value {
    json!({
        "time": Utc::now(),
        "session_id": session_id,
        "device_type": "mobile",
        "browser": "Chrome",
        "event_type": "web_vitals",
        "page_path": "/lobby",
        "lcp": 2150.0,
        "cls": 0.04,
        "inp": 180.0
    })
}

/// N frontend events with distinct sessions.
pub fn frontend_events(n: usize) -> Vec<Value> {
    (0..n).map(|i| frontend_event(&format!("sess-{i}"))).collect()
}

/// A backend API call metric.
pub fn api_metric(service: &str) -> Value {
    json!({
        "time": Utc::now(),
        "service_name": service,
        "endpoint": "/v1/login",
        "method": "POST",
        "duration_ms": 42.5,
        "status_code": 200,
        "request_id": "req-1"
    })
}

pub fn psp_metric(psp: &str, success: bool) -> Value {
    json!({
        "time": Utc::now(),
        "psp_name": psp,
        "operation": "deposit",
        "duration_ms": 830.0,
        "success": success,
        "transaction_id": "tx-1",
        "amount": 25.0,
        "currency": "EUR"
    })
}

pub fn game_metric(provider: &str) -> Value {
    json!({
        "time": Utc::now(),
        "provider": provider,
        "game_id": "book-of-dead",
        "game_type": "slots",
        "load_time_ms": 1200.0,
        "launch_success": true
    })
}

pub fn ws_metric(connection_id: &str) -> Value {
    json!({
        "time": Utc::now(),
        "connection_id": connection_id,
        "event_type": "connect",
        "latency_ms": 35.0,
        "endpoint": "/ws/live"
    })
}

/// `{"events": [...]}` payload for `/collect`.
pub fn events_payload(events: Vec<Value>) -> Value {
    json!({ "events": events })
}

/// `{"metrics": [...]}` payload for the backend collect routes.
pub fn metrics_payload(metrics: Vec<Value>) -> Value {
    json!({ "metrics": metrics })
}

/// Sets the `time` field of a JSON event.
pub fn at(mut event: Value, time: DateTime<Utc>) -> Value {
    event["time"] = json!(time);
    event
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).expect("fixture should deserialize")
}

/// Typed API event, ready for a sink.
pub fn api_event(service: &str) -> IngestEvent {
    parse::<ApiMetric>(api_metric(service)).into()
}

pub fn psp_event(psp: &str, success: bool) -> IngestEvent {
    parse::<PspMetric>(psp_metric(psp, success)).into()
}

pub fn game_event(provider: &str) -> IngestEvent {
    parse::<GameMetric>(game_metric(provider)).into()
}

pub fn ws_event(connection_id: &str) -> IngestEvent {
    parse::<WebSocketMetric>(ws_metric(connection_id)).into()
}

/// Typed frontend event, enriched as the `/collect` handler would.
pub fn enriched_frontend_event(session_id: &str) -> IngestEvent {
    let event: FrontendEvent = parse(frontend_event(session_id));
    enrich_frontend(event, "203.0.113.7", "Mozilla/5.0 (Test)", "", Utc::now()).into()
}
