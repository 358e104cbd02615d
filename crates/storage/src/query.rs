//! Dashboard read queries against the continuous aggregates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_core::Result;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use crate::client::PgStore;
use crate::error::DbResultExt;

/// Maximum rows returned by [`MetricsStore::alerts`].
pub const ALERT_LIMIT: i64 = 100;

/// A row from `api_performance_1m`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiPerformanceRow {
    pub bucket: DateTime<Utc>,
    pub service_name: String,
    pub endpoint: String,
    pub request_count: i64,
    pub avg_duration_ms: f64,
    pub p95_duration_ms: f64,
    pub p99_duration_ms: f64,
    pub error_count: i64,
    pub server_error_count: i64,
}

/// A single point in a time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

/// A row from `psp_success_5m`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PspHealthRow {
    pub bucket: DateTime<Utc>,
    pub psp_name: String,
    pub operation: String,
    pub total_count: i64,
    pub success_count: i64,
    pub avg_duration_ms: f64,
    pub p95_duration_ms: f64,
    pub total_amount: f64,
}

/// A row from `web_vitals_hourly`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebVitalsRow {
    pub bucket: DateTime<Utc>,
    pub device_type: String,
    pub page_path: String,
    pub sample_count: i64,
    pub avg_lcp_ms: f64,
    pub p75_lcp_ms: f64,
    pub avg_fid_ms: f64,
    pub p75_fid_ms: f64,
    pub avg_cls: f64,
    pub p75_cls: f64,
    pub avg_inp_ms: f64,
    pub p75_inp_ms: f64,
}

/// A row from `game_health_5m`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameHealthRow {
    pub bucket: DateTime<Utc>,
    pub provider: String,
    pub game_type: String,
    pub launch_count: i64,
    pub success_count: i64,
    pub avg_load_time_ms: f64,
    pub p95_load_time_ms: f64,
}

/// Headline numbers for the overview page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverviewMetrics {
    pub active_sessions: i64,
    /// Not derived from telemetry; always zero.
    pub ggr_today: f64,
    pub deposits_count: i64,
    pub deposits_volume: f64,
    pub error_rate: f64,
    pub avg_latency_ms: f64,
    pub psp_success_rate: f64,
    pub game_success_rate: f64,
}

/// A row from `alert_events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRow {
    pub time: DateTime<Utc>,
    pub alert_type: String,
    pub severity: String,
    pub source_table: String,
    pub metric_name: String,
    pub threshold_value: f64,
    pub actual_value: f64,
    pub acknowledged: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub message: String,
}

/// Web vital selectable in the vitals time series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VitalsMetric {
    #[default]
    Lcp,
    Fid,
    Cls,
    Inp,
}

impl VitalsMetric {
    /// Parses a metric name; unknown names fall back to LCP.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "fid" => Self::Fid,
            "cls" => Self::Cls,
            "inp" => Self::Inp,
            _ => Self::Lcp,
        }
    }

    /// Aggregate column holding this metric. Only these fixed names are ever
    /// interpolated into SQL.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Lcp => "avg_lcp_ms",
            Self::Fid => "avg_fid_ms",
            Self::Cls => "avg_cls",
            Self::Inp => "avg_inp_ms",
        }
    }
}

/// Read side of the dashboard.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Round trip used by readiness checks.
    async fn ping(&self) -> Result<()>;

    async fn overview(&self, start: DateTime<Utc>) -> Result<OverviewMetrics>;

    async fn api_performance(&self, start: DateTime<Utc>) -> Result<Vec<ApiPerformanceRow>>;

    /// Average latency per bucket for one service.
    async fn api_timeseries(&self, service: &str, start: DateTime<Utc>)
        -> Result<Vec<TimeSeriesPoint>>;

    async fn psp_health(&self, start: DateTime<Utc>) -> Result<Vec<PspHealthRow>>;

    /// Success rate (percent) per bucket for one PSP.
    async fn psp_timeseries(&self, psp: &str, start: DateTime<Utc>) -> Result<Vec<TimeSeriesPoint>>;

    async fn web_vitals(&self, start: DateTime<Utc>) -> Result<Vec<WebVitalsRow>>;

    async fn vitals_timeseries(
        &self,
        metric: VitalsMetric,
        start: DateTime<Utc>,
    ) -> Result<Vec<TimeSeriesPoint>>;

    async fn game_health(&self, start: DateTime<Utc>) -> Result<Vec<GameHealthRow>>;

    /// Launch success rate (percent) per bucket for one provider.
    async fn game_timeseries(&self, provider: &str, start: DateTime<Utc>)
        -> Result<Vec<TimeSeriesPoint>>;

    /// Latest alerts, optionally filtered on whether they are resolved.
    async fn alerts(&self, resolved: Option<bool>) -> Result<Vec<AlertRow>>;

    /// Marks alerts raised at `time` as acknowledged. Returns rows updated.
    async fn acknowledge_alert(&self, time: DateTime<Utc>) -> Result<u64>;
}

const API_PERFORMANCE_SQL: &str = "
    SELECT bucket, service_name, endpoint, request_count,
           COALESCE(avg_duration_ms, 0), COALESCE(p95_duration_ms, 0), COALESCE(p99_duration_ms, 0),
           error_count, server_error_count
    FROM api_performance_1m
    WHERE bucket >= $1
    ORDER BY bucket DESC, service_name, endpoint";

const API_TIMESERIES_SQL: &str = "
    SELECT bucket, COALESCE(avg_duration_ms, 0)
    FROM api_performance_1m
    WHERE service_name = $1 AND bucket >= $2
    ORDER BY bucket ASC";

const PSP_HEALTH_SQL: &str = "
    SELECT bucket, psp_name, operation, total_count, success_count,
           COALESCE(avg_duration_ms, 0), COALESCE(p95_duration_ms, 0), COALESCE(total_amount, 0)
    FROM psp_success_5m
    WHERE bucket >= $1
    ORDER BY bucket DESC, psp_name, operation";

const PSP_TIMESERIES_SQL: &str = "
    SELECT bucket,
           CASE WHEN total_count > 0 THEN success_count::float8 / total_count * 100 ELSE 100 END
    FROM psp_success_5m
    WHERE psp_name = $1 AND bucket >= $2
    ORDER BY bucket ASC";

const WEB_VITALS_SQL: &str = "
    SELECT bucket, COALESCE(device_type, 'unknown'), COALESCE(page_path, '/'),
           sample_count, COALESCE(avg_lcp_ms, 0), COALESCE(p75_lcp_ms, 0),
           COALESCE(avg_fid_ms, 0), COALESCE(p75_fid_ms, 0),
           COALESCE(avg_cls, 0), COALESCE(p75_cls, 0),
           COALESCE(avg_inp_ms, 0), COALESCE(p75_inp_ms, 0)
    FROM web_vitals_hourly
    WHERE bucket >= $1
    ORDER BY bucket DESC, device_type, page_path";

const GAME_HEALTH_SQL: &str = "
    SELECT bucket, provider, COALESCE(game_type, 'unknown'),
           launch_count, success_count,
           COALESCE(avg_load_time_ms, 0), COALESCE(p95_load_time_ms, 0)
    FROM game_health_5m
    WHERE bucket >= $1
    ORDER BY bucket DESC, provider, game_type";

const GAME_TIMESERIES_SQL: &str = "
    SELECT bucket,
           CASE WHEN launch_count > 0 THEN success_count::float8 / launch_count * 100 ELSE 100 END
    FROM game_health_5m
    WHERE provider = $1 AND bucket >= $2
    ORDER BY bucket ASC";

const ALERTS_SQL: &str = "
    SELECT time, alert_type, severity, COALESCE(source_table, ''),
           COALESCE(metric_name, ''), COALESCE(threshold_value, 0),
           COALESCE(actual_value, 0), acknowledged, resolved_at, COALESCE(message, '')
    FROM alert_events
    WHERE ($1::boolean IS NULL OR (resolved_at IS NOT NULL) = $1)
    ORDER BY time DESC
    LIMIT $2";

const ACKNOWLEDGE_ALERT_SQL: &str = "
    UPDATE alert_events
    SET acknowledged = TRUE
    WHERE time = $1";

fn vitals_timeseries_sql(metric: VitalsMetric) -> String {
    format!(
        "SELECT bucket, COALESCE(AVG({}), 0)::float8
         FROM web_vitals_hourly
         WHERE bucket >= $1
         GROUP BY bucket
         ORDER BY bucket ASC",
        metric.column()
    )
}

fn to_point(row: &Row) -> Result<TimeSeriesPoint> {
    Ok(TimeSeriesPoint {
        time: row.try_get(0).db_context("time")?,
        value: row.try_get(1).db_context("value")?,
    })
}

fn to_api_performance(row: &Row) -> Result<ApiPerformanceRow> {
    Ok(ApiPerformanceRow {
        bucket: row.try_get(0).db_context("bucket")?,
        service_name: row.try_get(1).db_context("service_name")?,
        endpoint: row.try_get(2).db_context("endpoint")?,
        request_count: row.try_get(3).db_context("request_count")?,
        avg_duration_ms: row.try_get(4).db_context("avg_duration_ms")?,
        p95_duration_ms: row.try_get(5).db_context("p95_duration_ms")?,
        p99_duration_ms: row.try_get(6).db_context("p99_duration_ms")?,
        error_count: row.try_get(7).db_context("error_count")?,
        server_error_count: row.try_get(8).db_context("server_error_count")?,
    })
}

fn to_psp_health(row: &Row) -> Result<PspHealthRow> {
    Ok(PspHealthRow {
        bucket: row.try_get(0).db_context("bucket")?,
        psp_name: row.try_get(1).db_context("psp_name")?,
        operation: row.try_get(2).db_context("operation")?,
        total_count: row.try_get(3).db_context("total_count")?,
        success_count: row.try_get(4).db_context("success_count")?,
        avg_duration_ms: row.try_get(5).db_context("avg_duration_ms")?,
        p95_duration_ms: row.try_get(6).db_context("p95_duration_ms")?,
        total_amount: row.try_get(7).db_context("total_amount")?,
    })
}

fn to_web_vitals(row: &Row) -> Result<WebVitalsRow> {
    Ok(WebVitalsRow {
        bucket: row.try_get(0).db_context("bucket")?,
        device_type: row.try_get(1).db_context("device_type")?,
        page_path: row.try_get(2).db_context("page_path")?,
        sample_count: row.try_get(3).db_context("sample_count")?,
        avg_lcp_ms: row.try_get(4).db_context("avg_lcp_ms")?,
        p75_lcp_ms: row.try_get(5).db_context("p75_lcp_ms")?,
        avg_fid_ms: row.try_get(6).db_context("avg_fid_ms")?,
        p75_fid_ms: row.try_get(7).db_context("p75_fid_ms")?,
        avg_cls: row.try_get(8).db_context("avg_cls")?,
        p75_cls: row.try_get(9).db_context("p75_cls")?,
        avg_inp_ms: row.try_get(10).db_context("avg_inp_ms")?,
        p75_inp_ms: row.try_get(11).db_context("p75_inp_ms")?,
    })
}

fn to_game_health(row: &Row) -> Result<GameHealthRow> {
    Ok(GameHealthRow {
        bucket: row.try_get(0).db_context("bucket")?,
        provider: row.try_get(1).db_context("provider")?,
        game_type: row.try_get(2).db_context("game_type")?,
        launch_count: row.try_get(3).db_context("launch_count")?,
        success_count: row.try_get(4).db_context("success_count")?,
        avg_load_time_ms: row.try_get(5).db_context("avg_load_time_ms")?,
        p95_load_time_ms: row.try_get(6).db_context("p95_load_time_ms")?,
    })
}

fn to_alert(row: &Row) -> Result<AlertRow> {
    Ok(AlertRow {
        time: row.try_get(0).db_context("time")?,
        alert_type: row.try_get(1).db_context("alert_type")?,
        severity: row.try_get(2).db_context("severity")?,
        source_table: row.try_get(3).db_context("source_table")?,
        metric_name: row.try_get(4).db_context("metric_name")?,
        threshold_value: row.try_get(5).db_context("threshold_value")?,
        actual_value: row.try_get(6).db_context("actual_value")?,
        acknowledged: row.try_get(7).db_context("acknowledged")?,
        resolved_at: row.try_get(8).db_context("resolved_at")?,
        message: row.try_get(9).db_context("message")?,
    })
}

impl PgStore {
    async fn query_rows<T>(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
        map: fn(&Row) -> Result<T>,
    ) -> Result<Vec<T>> {
        let client = self.get().await?;
        let rows = client.query(sql, params).await.db_context("query")?;
        rows.iter().map(map).collect()
    }
}

#[async_trait]
impl MetricsStore for PgStore {
    async fn ping(&self) -> Result<()> {
        PgStore::ping(self).await
    }

    async fn overview(&self, start: DateTime<Utc>) -> Result<OverviewMetrics> {
        let client = self.get().await?;

        let active_sessions = client
            .query_one(
                "SELECT COUNT(DISTINCT session_id) FROM frontend_metrics WHERE time >= $1",
                &[&start],
            )
            .await
            .db_context("active sessions")?;

        let api = client
            .query_one(
                "SELECT
                    COALESCE(AVG(CASE WHEN error_count > 0
                        THEN error_count::float8 / NULLIF(request_count, 0) * 100 ELSE 0 END), 0)::float8,
                    COALESCE(AVG(avg_duration_ms), 0)::float8
                 FROM api_performance_1m
                 WHERE bucket >= $1",
                &[&start],
            )
            .await
            .db_context("api overview")?;

        let psp = client
            .query_one(
                "SELECT
                    COALESCE(SUM(CASE WHEN operation = 'deposit' THEN total_count ELSE 0 END), 0)::int8,
                    COALESCE(SUM(CASE WHEN operation = 'deposit' THEN total_amount ELSE 0 END), 0)::float8,
                    COALESCE(AVG(CASE WHEN total_count > 0
                        THEN success_count::float8 / total_count * 100 ELSE 100 END), 100)::float8
                 FROM psp_success_5m
                 WHERE bucket >= $1",
                &[&start],
            )
            .await
            .db_context("psp overview")?;

        let games = client
            .query_one(
                "SELECT COALESCE(AVG(CASE WHEN launch_count > 0
                    THEN success_count::float8 / launch_count * 100 ELSE 100 END), 100)::float8
                 FROM game_health_5m
                 WHERE bucket >= $1",
                &[&start],
            )
            .await
            .db_context("game overview")?;

        Ok(OverviewMetrics {
            active_sessions: active_sessions.try_get(0).db_context("active_sessions")?,
            ggr_today: 0.0,
            deposits_count: psp.try_get(0).db_context("deposits_count")?,
            deposits_volume: psp.try_get(1).db_context("deposits_volume")?,
            error_rate: api.try_get(0).db_context("error_rate")?,
            avg_latency_ms: api.try_get(1).db_context("avg_latency_ms")?,
            psp_success_rate: psp.try_get(2).db_context("psp_success_rate")?,
            game_success_rate: games.try_get(0).db_context("game_success_rate")?,
        })
    }

    async fn api_performance(&self, start: DateTime<Utc>) -> Result<Vec<ApiPerformanceRow>> {
        self.query_rows(API_PERFORMANCE_SQL, &[&start], to_api_performance)
            .await
    }

    async fn api_timeseries(
        &self,
        service: &str,
        start: DateTime<Utc>,
    ) -> Result<Vec<TimeSeriesPoint>> {
        self.query_rows(API_TIMESERIES_SQL, &[&service, &start], to_point)
            .await
    }

    async fn psp_health(&self, start: DateTime<Utc>) -> Result<Vec<PspHealthRow>> {
        self.query_rows(PSP_HEALTH_SQL, &[&start], to_psp_health).await
    }

    async fn psp_timeseries(&self, psp: &str, start: DateTime<Utc>) -> Result<Vec<TimeSeriesPoint>> {
        self.query_rows(PSP_TIMESERIES_SQL, &[&psp, &start], to_point)
            .await
    }

    async fn web_vitals(&self, start: DateTime<Utc>) -> Result<Vec<WebVitalsRow>> {
        self.query_rows(WEB_VITALS_SQL, &[&start], to_web_vitals).await
    }

    async fn vitals_timeseries(
        &self,
        metric: VitalsMetric,
        start: DateTime<Utc>,
    ) -> Result<Vec<TimeSeriesPoint>> {
        let sql = vitals_timeseries_sql(metric);
        self.query_rows(&sql, &[&start], to_point).await
    }

    async fn game_health(&self, start: DateTime<Utc>) -> Result<Vec<GameHealthRow>> {
        self.query_rows(GAME_HEALTH_SQL, &[&start], to_game_health).await
    }

    async fn game_timeseries(
        &self,
        provider: &str,
        start: DateTime<Utc>,
    ) -> Result<Vec<TimeSeriesPoint>> {
        self.query_rows(GAME_TIMESERIES_SQL, &[&provider, &start], to_point)
            .await
    }

    async fn alerts(&self, resolved: Option<bool>) -> Result<Vec<AlertRow>> {
        self.query_rows(ALERTS_SQL, &[&resolved, &ALERT_LIMIT], to_alert)
            .await
    }

    async fn acknowledge_alert(&self, time: DateTime<Utc>) -> Result<u64> {
        let client = self.get().await?;
        client
            .execute(ACKNOWLEDGE_ALERT_SQL, &[&time])
            .await
            .db_context("acknowledge alert")
    }
}
