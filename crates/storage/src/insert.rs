//! Bulk load of collector batches.

use async_trait::async_trait;
use collector::{EventBatch, EventSink};
use pulse_core::{Category, IngestEvent, Result};
use std::pin::pin;
use tokio_postgres::binary_copy::BinaryCopyInWriter;
use tokio_postgres::types::{ToSql, Type};
use tracing::debug;

use crate::client::PgStore;
use crate::error::DbResultExt;

const FRONTEND_COLUMNS: &[&str] = &[
    "time", "session_id", "player_id", "device_type", "browser", "country",
    "event_type", "page_path", "lcp_ms", "fid_ms", "cls", "ttfb_ms", "fcp_ms", "inp_ms",
    "metric_name", "metric_value", "metadata",
];

const API_COLUMNS: &[&str] = &[
    "time", "service_name", "endpoint", "method", "duration_ms", "status_code",
    "player_id", "request_id", "error_type", "error_message",
    "request_size", "response_size", "metadata",
];

const PSP_COLUMNS: &[&str] = &[
    "time", "psp_name", "operation", "duration_ms", "success",
    "player_id", "transaction_id", "amount", "currency",
    "error_code", "error_message", "psp_response_code", "metadata",
];

const GAME_COLUMNS: &[&str] = &[
    "time", "provider", "game_id", "game_type", "load_time_ms", "launch_success",
    "player_id", "session_id", "device_type", "error_type", "error_message", "metadata",
];

const WEBSOCKET_COLUMNS: &[&str] = &[
    "time", "connection_id", "player_id", "event_type", "latency_ms",
    "messages_sent", "messages_received", "close_code", "close_reason",
    "endpoint", "device_type", "metadata",
];

/// Destination columns for a category, in COPY order.
pub fn columns(category: Category) -> &'static [&'static str] {
    match category {
        Category::Frontend => FRONTEND_COLUMNS,
        Category::Api => API_COLUMNS,
        Category::Psp => PSP_COLUMNS,
        Category::Game => GAME_COLUMNS,
        Category::WebSocket => WEBSOCKET_COLUMNS,
    }
}

/// Wire types matching [`columns`].
fn column_types(category: Category) -> Vec<Type> {
    use Type as T;
    match category {
        Category::Frontend => vec![
            T::TIMESTAMPTZ, T::TEXT, T::TEXT, T::TEXT, T::TEXT, T::TEXT,
            T::TEXT, T::TEXT, T::FLOAT8, T::FLOAT8, T::FLOAT8, T::FLOAT8, T::FLOAT8, T::FLOAT8,
            T::TEXT, T::FLOAT8, T::JSONB,
        ],
        Category::Api => vec![
            T::TIMESTAMPTZ, T::TEXT, T::TEXT, T::TEXT, T::FLOAT8, T::INT4,
            T::TEXT, T::TEXT, T::TEXT, T::TEXT,
            T::INT8, T::INT8, T::JSONB,
        ],
        Category::Psp => vec![
            T::TIMESTAMPTZ, T::TEXT, T::TEXT, T::FLOAT8, T::BOOL,
            T::TEXT, T::TEXT, T::FLOAT8, T::TEXT,
            T::TEXT, T::TEXT, T::TEXT, T::JSONB,
        ],
        Category::Game => vec![
            T::TIMESTAMPTZ, T::TEXT, T::TEXT, T::TEXT, T::FLOAT8, T::BOOL,
            T::TEXT, T::TEXT, T::TEXT, T::TEXT, T::TEXT, T::JSONB,
        ],
        Category::WebSocket => vec![
            T::TIMESTAMPTZ, T::TEXT, T::TEXT, T::TEXT, T::FLOAT8,
            T::INT8, T::INT8, T::INT4, T::TEXT,
            T::TEXT, T::TEXT, T::JSONB,
        ],
    }
}

/// `COPY <table> (<columns>) FROM STDIN BINARY`
pub fn copy_statement(category: Category) -> String {
    format!(
        "COPY {} ({}) FROM STDIN BINARY",
        category.table(),
        columns(category).join(", ")
    )
}

/// Column values of one event, in [`columns`] order.
fn row_values(event: &IngestEvent) -> Vec<&(dyn ToSql + Sync)> {
    match event {
        IngestEvent::Frontend(e) => {
            let e = &e.event;
            let row: [&(dyn ToSql + Sync); 17] = [
                &e.time, &e.session_id, &e.player_id, &e.device_type, &e.browser, &e.country,
                &e.event_type, &e.page_path, &e.lcp, &e.fid, &e.cls, &e.ttfb, &e.fcp, &e.inp,
                &e.metric_name, &e.metric_value, &e.metadata,
            ];
            row.to_vec()
        }
        IngestEvent::Api(m) => {
            let row: [&(dyn ToSql + Sync); 13] = [
                &m.time, &m.service_name, &m.endpoint, &m.method, &m.duration_ms, &m.status_code,
                &m.player_id, &m.request_id, &m.error_type, &m.error_message,
                &m.request_size, &m.response_size, &m.metadata,
            ];
            row.to_vec()
        }
        IngestEvent::Psp(m) => {
            let row: [&(dyn ToSql + Sync); 13] = [
                &m.time, &m.psp_name, &m.operation, &m.duration_ms, &m.success,
                &m.player_id, &m.transaction_id, &m.amount, &m.currency,
                &m.error_code, &m.error_message, &m.psp_response_code, &m.metadata,
            ];
            row.to_vec()
        }
        IngestEvent::Game(m) => {
            let row: [&(dyn ToSql + Sync); 12] = [
                &m.time, &m.provider, &m.game_id, &m.game_type, &m.load_time_ms, &m.launch_success,
                &m.player_id, &m.session_id, &m.device_type, &m.error_type, &m.error_message,
                &m.metadata,
            ];
            row.to_vec()
        }
        IngestEvent::WebSocket(m) => {
            let row: [&(dyn ToSql + Sync); 12] = [
                &m.time, &m.connection_id, &m.player_id, &m.event_type, &m.latency_ms,
                &m.messages_sent, &m.messages_received, &m.close_code, &m.close_reason,
                &m.endpoint, &m.device_type, &m.metadata,
            ];
            row.to_vec()
        }
    }
}

impl PgStore {
    /// Writes one batch with a single binary COPY. Returns rows written.
    pub async fn copy_batch(&self, batch: &EventBatch) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let category = batch.category();
        let statement = copy_statement(category);
        let client = self.get().await?;
        let sink = client
            .copy_in(statement.as_str())
            .await
            .db_context(category.table())?;

        let mut writer = pin!(BinaryCopyInWriter::new(sink, &column_types(category)));
        for event in batch.events() {
            writer
                .as_mut()
                .write(&row_values(event))
                .await
                .db_context(category.table())?;
        }
        let rows = writer.as_mut().finish().await.db_context(category.table())?;

        debug!(category = %category, rows, "copied batch");
        Ok(rows)
    }
}

#[async_trait]
impl EventSink for PgStore {
    async fn write(&self, batch: EventBatch) -> Result<()> {
        self.copy_batch(&batch).await.map(|_| ())
    }
}
