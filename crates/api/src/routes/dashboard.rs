//! Dashboard read endpoints backed by the continuous aggregates.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use pulse_storage::{
    AlertRow, ApiPerformanceRow, GameHealthRow, OverviewMetrics, PspHealthRow, TimeSeriesPoint,
    VitalsMetric, WebVitalsRow,
};
use serde::Deserialize;
use std::future::Future;
use telemetry::metrics;
use tracing::error;

use crate::response::{ApiError, StatusResponse};
use crate::state::AppState;

/// Query string shared by the dashboard endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    /// RFC 3339 lower bound; defaults to one hour ago
    pub start: Option<String>,
    pub service: Option<String>,
    pub psp: Option<String>,
    pub provider: Option<String>,
    pub metric: Option<String>,
}

impl DashboardQuery {
    fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        parse_start(self.start.as_deref(), now)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    pub resolved: Option<String>,
}

/// Parses the `start` parameter, falling back to one hour before `now`.
pub fn parse_start(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| now - Duration::hours(1))
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{name} parameter required")))
}

/// Runs a store query, logging and counting failures.
async fn run<T, F>(query: &'static str, fut: F) -> Result<Json<T>, ApiError>
where
    F: Future<Output = pulse_core::Result<T>>,
{
    metrics().dashboard_queries.inc();

    fut.await.map(Json).map_err(|e| {
        metrics().dashboard_query_errors.inc();
        error!(query, error = %e, "dashboard query failed");
        ApiError::internal("internal error")
    })
}

/// GET /api/metrics/overview
pub async fn overview(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<OverviewMetrics>, ApiError> {
    let start = query.start(Utc::now());
    run("overview", state.store.overview(start)).await
}

/// GET /api/metrics/api
pub async fn api_performance(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Vec<ApiPerformanceRow>>, ApiError> {
    let start = query.start(Utc::now());
    run("api_performance", state.store.api_performance(start)).await
}

/// GET /api/metrics/api/timeseries?service=
pub async fn api_timeseries(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Vec<TimeSeriesPoint>>, ApiError> {
    let service = required(&query.service, "service")?;
    let start = query.start(Utc::now());
    run("api_timeseries", state.store.api_timeseries(service, start)).await
}

/// GET /api/metrics/psp
pub async fn psp_health(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Vec<PspHealthRow>>, ApiError> {
    let start = query.start(Utc::now());
    run("psp_health", state.store.psp_health(start)).await
}

/// GET /api/metrics/psp/timeseries?psp=
pub async fn psp_timeseries(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Vec<TimeSeriesPoint>>, ApiError> {
    let psp = required(&query.psp, "psp")?;
    let start = query.start(Utc::now());
    run("psp_timeseries", state.store.psp_timeseries(psp, start)).await
}

/// GET /api/metrics/vitals
pub async fn web_vitals(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Vec<WebVitalsRow>>, ApiError> {
    let start = query.start(Utc::now());
    run("web_vitals", state.store.web_vitals(start)).await
}

/// GET /api/metrics/vitals/timeseries?metric=lcp|fid|cls|inp
pub async fn vitals_timeseries(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Vec<TimeSeriesPoint>>, ApiError> {
    let metric = query
        .metric
        .as_deref()
        .map(VitalsMetric::parse)
        .unwrap_or_default();
    let start = query.start(Utc::now());
    run("vitals_timeseries", state.store.vitals_timeseries(metric, start)).await
}

/// GET /api/metrics/games
pub async fn game_health(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Vec<GameHealthRow>>, ApiError> {
    let start = query.start(Utc::now());
    run("game_health", state.store.game_health(start)).await
}

/// GET /api/metrics/games/timeseries?provider=
pub async fn game_timeseries(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Vec<TimeSeriesPoint>>, ApiError> {
    let provider = required(&query.provider, "provider")?;
    let start = query.start(Utc::now());
    run("game_timeseries", state.store.game_timeseries(provider, start)).await
}

/// GET /api/alerts?resolved=true|false
///
/// Any value other than `true` filters for unresolved alerts.
pub async fn alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<Vec<AlertRow>>, ApiError> {
    let resolved = query
        .resolved
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(|v| v == "true");
    run("alerts", state.store.alerts(resolved)).await
}

/// POST /api/alerts/:alert_time/acknowledge
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(alert_time): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let time = DateTime::parse_from_rfc3339(&alert_time)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ApiError::bad_request("invalid alert time format"))?;

    run("acknowledge_alert", state.store.acknowledge_alert(time)).await?;
    Ok(Json(StatusResponse::new("ok")))
}
