//! Ingestion endpoint handlers.
//!
//! Each handler decodes a whole batch, validates events one by one and hands
//! the valid ones to the collector. The response never waits for a flush.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use pulse_core::{
    enrich_frontend, resolve_country, ApiMetric, Category, FrontendBatch, GameMetric,
    IngestEvent, MetricBatch, PspMetric, WebSocketMetric,
};
use serde::de::DeserializeOwned;
use telemetry::metrics;
use tracing::debug;
use validator::Validate;

use crate::extractors::{ClientIp, UserAgent};
use crate::response::{ApiError, IngestResponse};
use crate::state::AppState;

type IngestResult = Result<(StatusCode, Json<IngestResponse>), ApiError>;

/// POST /collect - Frontend SDK events.
pub async fn collect_frontend(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    UserAgent(user_agent): UserAgent,
    body: Result<Bytes, BytesRejection>,
) -> IngestResult {
    let batch: FrontendBatch = decode(body)?;
    let country = resolve_country(&ip);
    let now = Utc::now();

    let response = admit(&state, Category::Frontend, batch.events, |event| {
        enrich_frontend(event, &ip, &user_agent, &country, now).into()
    });
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// POST /collect/api - Backend API call metrics.
pub async fn collect_api(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> IngestResult {
    collect_metrics::<ApiMetric>(&state, Category::Api, body)
}

/// POST /collect/psp - Payment provider metrics.
pub async fn collect_psp(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> IngestResult {
    collect_metrics::<PspMetric>(&state, Category::Psp, body)
}

/// POST /collect/game - Game provider metrics.
pub async fn collect_game(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> IngestResult {
    collect_metrics::<GameMetric>(&state, Category::Game, body)
}

/// POST /collect/ws - WebSocket connection metrics.
pub async fn collect_ws(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> IngestResult {
    collect_metrics::<WebSocketMetric>(&state, Category::WebSocket, body)
}

fn collect_metrics<T>(
    state: &AppState,
    category: Category,
    body: Result<Bytes, BytesRejection>,
) -> IngestResult
where
    T: DeserializeOwned + Validate + Into<IngestEvent>,
{
    let batch: MetricBatch<T> = decode(body)?;
    let now = Utc::now();

    let response = admit(state, category, batch.metrics, |metric| {
        Into::<IngestEvent>::into(metric).normalize(now)
    });
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Buffers and parses a request body, counting malformed requests.
fn decode<T: DeserializeOwned>(body: Result<Bytes, BytesRejection>) -> Result<T, ApiError> {
    metrics().ingest_requests.inc();

    let body = body.map_err(|rejection| {
        metrics().malformed_requests.inc();
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::payload_too_large("Request body too large")
        } else {
            ApiError::bad_request(rejection.body_text())
        }
    })?;

    serde_json::from_slice(&body).map_err(|e| {
        metrics().malformed_requests.inc();
        debug!(error = %e, size = body.len(), "invalid request body");
        ApiError::bad_request("invalid json")
    })
}

/// Validates each item and pushes the valid ones into the collector.
fn admit<T, F>(state: &AppState, category: Category, items: Vec<T>, to_event: F) -> IngestResponse
where
    T: Validate,
    F: Fn(T) -> IngestEvent,
{
    let mut accepted = 0;
    let mut rejected = 0;

    for item in items {
        if let Err(errors) = item.validate() {
            rejected += 1;
            debug!(category = %category, error = %errors, "rejected invalid event");
            continue;
        }
        state.collector.push(to_event(item));
        accepted += 1;
    }

    metrics().events_decoded.inc_by((accepted + rejected) as u64);
    metrics().events_rejected.inc_by(rejected as u64);

    debug!(category = %category, accepted, rejected, "batch admitted");
    IngestResponse::new(accepted, rejected)
}
