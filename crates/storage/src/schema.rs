//! TimescaleDB schema.
//!
//! Every statement is idempotent. Continuous aggregates cannot be created
//! inside a transaction, so statements run one at a time.

use pulse_core::Result;
use tracing::info;

use crate::client::PgStore;
use crate::error::DbResultExt;

pub const CREATE_EXTENSION: &str = "CREATE EXTENSION IF NOT EXISTS timescaledb";

pub const CREATE_FRONTEND_METRICS: &str = r#"
CREATE TABLE IF NOT EXISTS frontend_metrics (
    time          TIMESTAMPTZ      NOT NULL,
    session_id    TEXT             NOT NULL,
    player_id     TEXT,
    device_type   TEXT,
    browser       TEXT,
    country       TEXT,
    event_type    TEXT             NOT NULL,
    page_path     TEXT,
    lcp_ms        DOUBLE PRECISION,
    fid_ms        DOUBLE PRECISION,
    cls           DOUBLE PRECISION,
    ttfb_ms       DOUBLE PRECISION,
    fcp_ms        DOUBLE PRECISION,
    inp_ms        DOUBLE PRECISION,
    metric_name   TEXT,
    metric_value  DOUBLE PRECISION,
    metadata      JSONB
)
"#;

pub const CREATE_API_METRICS: &str = r#"
CREATE TABLE IF NOT EXISTS api_metrics (
    time           TIMESTAMPTZ      NOT NULL,
    service_name   TEXT             NOT NULL,
    endpoint       TEXT             NOT NULL,
    method         TEXT             NOT NULL,
    duration_ms    DOUBLE PRECISION NOT NULL,
    status_code    INTEGER          NOT NULL,
    player_id      TEXT,
    request_id     TEXT,
    error_type     TEXT,
    error_message  TEXT,
    request_size   BIGINT,
    response_size  BIGINT,
    metadata       JSONB
)
"#;

pub const CREATE_PSP_METRICS: &str = r#"
CREATE TABLE IF NOT EXISTS psp_metrics (
    time               TIMESTAMPTZ      NOT NULL,
    psp_name           TEXT             NOT NULL,
    operation          TEXT             NOT NULL,
    duration_ms        DOUBLE PRECISION NOT NULL,
    success            BOOLEAN          NOT NULL,
    player_id          TEXT,
    transaction_id     TEXT,
    amount             DOUBLE PRECISION,
    currency           TEXT,
    error_code         TEXT,
    error_message      TEXT,
    psp_response_code  TEXT,
    metadata           JSONB
)
"#;

pub const CREATE_GAME_METRICS: &str = r#"
CREATE TABLE IF NOT EXISTS game_metrics (
    time            TIMESTAMPTZ      NOT NULL,
    provider        TEXT             NOT NULL,
    game_id         TEXT             NOT NULL,
    game_type       TEXT,
    load_time_ms    DOUBLE PRECISION,
    launch_success  BOOLEAN          NOT NULL,
    player_id       TEXT,
    session_id      TEXT,
    device_type     TEXT,
    error_type      TEXT,
    error_message   TEXT,
    metadata        JSONB
)
"#;

pub const CREATE_WEBSOCKET_METRICS: &str = r#"
CREATE TABLE IF NOT EXISTS websocket_metrics (
    time               TIMESTAMPTZ      NOT NULL,
    connection_id      TEXT             NOT NULL,
    player_id          TEXT,
    event_type         TEXT             NOT NULL,
    latency_ms         DOUBLE PRECISION,
    messages_sent      BIGINT,
    messages_received  BIGINT,
    close_code         INTEGER,
    close_reason       TEXT,
    endpoint           TEXT,
    device_type        TEXT,
    metadata           JSONB
)
"#;

pub const CREATE_ALERT_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS alert_events (
    time             TIMESTAMPTZ      NOT NULL,
    alert_type       TEXT             NOT NULL,
    severity         TEXT             NOT NULL,
    source_table     TEXT,
    metric_name      TEXT,
    threshold_value  DOUBLE PRECISION,
    actual_value     DOUBLE PRECISION,
    acknowledged     BOOLEAN          NOT NULL DEFAULT FALSE,
    resolved_at      TIMESTAMPTZ,
    message          TEXT
)
"#;

pub const CREATE_API_PERFORMANCE_1M: &str = r#"
CREATE MATERIALIZED VIEW IF NOT EXISTS api_performance_1m
WITH (timescaledb.continuous) AS
SELECT
    time_bucket('1 minute', time) AS bucket,
    service_name,
    endpoint,
    COUNT(*) AS request_count,
    AVG(duration_ms) AS avg_duration_ms,
    percentile_cont(0.95) WITHIN GROUP (ORDER BY duration_ms) AS p95_duration_ms,
    percentile_cont(0.99) WITHIN GROUP (ORDER BY duration_ms) AS p99_duration_ms,
    COUNT(*) FILTER (WHERE status_code >= 400) AS error_count,
    COUNT(*) FILTER (WHERE status_code >= 500) AS server_error_count
FROM api_metrics
GROUP BY bucket, service_name, endpoint
WITH NO DATA
"#;

pub const CREATE_PSP_SUCCESS_5M: &str = r#"
CREATE MATERIALIZED VIEW IF NOT EXISTS psp_success_5m
WITH (timescaledb.continuous) AS
SELECT
    time_bucket('5 minutes', time) AS bucket,
    psp_name,
    operation,
    COUNT(*) AS total_count,
    COUNT(*) FILTER (WHERE success) AS success_count,
    AVG(duration_ms) AS avg_duration_ms,
    percentile_cont(0.95) WITHIN GROUP (ORDER BY duration_ms) AS p95_duration_ms,
    SUM(amount) AS total_amount
FROM psp_metrics
GROUP BY bucket, psp_name, operation
WITH NO DATA
"#;

pub const CREATE_WEB_VITALS_HOURLY: &str = r#"
CREATE MATERIALIZED VIEW IF NOT EXISTS web_vitals_hourly
WITH (timescaledb.continuous) AS
SELECT
    time_bucket('1 hour', time) AS bucket,
    device_type,
    page_path,
    COUNT(*) AS sample_count,
    AVG(lcp_ms) AS avg_lcp_ms,
    percentile_cont(0.75) WITHIN GROUP (ORDER BY lcp_ms) AS p75_lcp_ms,
    AVG(fid_ms) AS avg_fid_ms,
    percentile_cont(0.75) WITHIN GROUP (ORDER BY fid_ms) AS p75_fid_ms,
    AVG(cls) AS avg_cls,
    percentile_cont(0.75) WITHIN GROUP (ORDER BY cls) AS p75_cls,
    AVG(inp_ms) AS avg_inp_ms,
    percentile_cont(0.75) WITHIN GROUP (ORDER BY inp_ms) AS p75_inp_ms
FROM frontend_metrics
GROUP BY bucket, device_type, page_path
WITH NO DATA
"#;

pub const CREATE_GAME_HEALTH_5M: &str = r#"
CREATE MATERIALIZED VIEW IF NOT EXISTS game_health_5m
WITH (timescaledb.continuous) AS
SELECT
    time_bucket('5 minutes', time) AS bucket,
    provider,
    game_type,
    COUNT(*) AS launch_count,
    COUNT(*) FILTER (WHERE launch_success) AS success_count,
    AVG(load_time_ms) AS avg_load_time_ms,
    percentile_cont(0.95) WITHIN GROUP (ORDER BY load_time_ms) AS p95_load_time_ms
FROM game_metrics
GROUP BY bucket, provider, game_type
WITH NO DATA
"#;

/// Raw tables, created before their hypertables.
pub fn all_tables() -> Vec<&'static str> {
    vec![
        CREATE_FRONTEND_METRICS,
        CREATE_API_METRICS,
        CREATE_PSP_METRICS,
        CREATE_GAME_METRICS,
        CREATE_WEBSOCKET_METRICS,
        CREATE_ALERT_EVENTS,
    ]
}

/// Tables converted to hypertables on `time`.
pub const HYPERTABLES: &[&str] = &[
    "frontend_metrics",
    "api_metrics",
    "psp_metrics",
    "game_metrics",
    "websocket_metrics",
    "alert_events",
];

/// Continuous aggregates and their refresh cadence.
pub const CONTINUOUS_AGGREGATES: &[(&str, &str, &str)] = &[
    ("api_performance_1m", CREATE_API_PERFORMANCE_1M, "1 minute"),
    ("psp_success_5m", CREATE_PSP_SUCCESS_5M, "5 minutes"),
    ("web_vitals_hourly", CREATE_WEB_VITALS_HOURLY, "1 hour"),
    ("game_health_5m", CREATE_GAME_HEALTH_5M, "5 minutes"),
];

/// Every DDL statement in execution order.
pub fn all_statements() -> Vec<String> {
    let mut statements = vec![CREATE_EXTENSION.to_string()];
    statements.extend(all_tables().into_iter().map(str::to_string));
    statements.extend(HYPERTABLES.iter().map(|table| {
        format!("SELECT create_hypertable('{table}', 'time', if_not_exists => TRUE)")
    }));
    for (view, ddl, every) in CONTINUOUS_AGGREGATES {
        statements.push(ddl.to_string());
        statements.push(format!(
            "SELECT add_continuous_aggregate_policy('{view}', \
             start_offset => INTERVAL '1 day', end_offset => INTERVAL '{every}', \
             schedule_interval => INTERVAL '{every}', if_not_exists => TRUE)"
        ));
    }
    statements
}

/// Creates tables, hypertables and continuous aggregates if missing.
pub async fn init_schema(store: &PgStore) -> Result<()> {
    let client = store.get().await?;
    for ddl in all_statements() {
        client.batch_execute(&ddl).await.db_context("schema")?;
    }

    info!("database schema initialized");
    Ok(())
}
