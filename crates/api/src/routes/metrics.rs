//! Collector statistics endpoint.

use axum::{extract::State, Json};
use collector::StatsSnapshot;

use crate::state::AppState;

/// GET /metrics - Point-in-time collector counters.
pub async fn metrics_handler(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.collector.stats())
}
