//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use pulse_storage::health::check_connection;
use serde_json::{json, Value};
use telemetry::health;

use crate::response::HealthResponse;
use crate::state::AppState;

/// GET /health - Service status with the last known database state.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = health().report();

    Json(HealthResponse {
        status: report.status.as_str().to_string(),
        database_connected: health().database.is_healthy(),
        queue_depth: state.collector.queue_depth(),
    })
}

/// GET /health/ready - Readiness probe; pings the store.
pub async fn ready_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    if check_connection(state.store.as_ref()).await {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "error", "message": "database unavailable" })),
        )
    }
}

/// GET /health/live - Liveness probe (service is running).
pub async fn live_handler() -> StatusCode {
    if health().is_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
