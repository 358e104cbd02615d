//! Event type definitions for the ingestion service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::enrich::normalize_time;

/// Telemetry category. Every category owns one hypertable and one batch slot
/// per collector worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Frontend,
    Api,
    Psp,
    Game,
    #[serde(rename = "websocket")]
    WebSocket,
}

impl Category {
    pub const COUNT: usize = 5;

    pub const ALL: [Category; Category::COUNT] = [
        Category::Frontend,
        Category::Api,
        Category::Psp,
        Category::Game,
        Category::WebSocket,
    ];

    /// Returns the category name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Api => "api",
            Self::Psp => "psp",
            Self::Game => "game",
            Self::WebSocket => "websocket",
        }
    }

    /// Returns the destination table for this category.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Frontend => "frontend_metrics",
            Self::Api => "api_metrics",
            Self::Psp => "psp_metrics",
            Self::Game => "game_metrics",
            Self::WebSocket => "websocket_metrics",
        }
    }

    /// Dense index, stable for the life of the process.
    pub fn index(&self) -> usize {
        match self {
            Self::Frontend => 0,
            Self::Api => 1,
            Self::Psp => 2,
            Self::Game => 3,
            Self::WebSocket => 4,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frontend performance event (web vitals, page timings, custom metrics).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FrontendEvent {
    /// Event timestamp. Missing timestamps deserialize to the Unix epoch and
    /// are replaced during normalization.
    #[serde(default)]
    pub time: DateTime<Utc>,
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    #[validate(length(max = 128))]
    pub player_id: Option<String>,
    #[validate(length(max = 64))]
    pub device_type: Option<String>,
    #[validate(length(max = 64))]
    pub browser: Option<String>,
    #[validate(length(max = 3))]
    pub country: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub event_type: String,
    #[validate(length(max = 2048))]
    pub page_path: Option<String>,
    /// Largest Contentful Paint (ms)
    #[serde(alias = "lcp_ms")]
    #[validate(range(min = 0.0, max = 600000.0))]
    pub lcp: Option<f64>,
    /// First Input Delay (ms)
    #[serde(alias = "fid_ms")]
    #[validate(range(min = 0.0, max = 600000.0))]
    pub fid: Option<f64>,
    /// Cumulative Layout Shift
    #[validate(range(min = 0.0, max = 10.0))]
    pub cls: Option<f64>,
    /// Time to First Byte (ms)
    #[serde(alias = "ttfb_ms")]
    #[validate(range(min = 0.0, max = 600000.0))]
    pub ttfb: Option<f64>,
    /// First Contentful Paint (ms)
    #[serde(alias = "fcp_ms")]
    #[validate(range(min = 0.0, max = 600000.0))]
    pub fcp: Option<f64>,
    /// Interaction to Next Paint (ms)
    #[serde(alias = "inp_ms")]
    #[validate(range(min = 0.0, max = 600000.0))]
    pub inp: Option<f64>,
    #[validate(length(max = 64))]
    pub metric_name: Option<String>,
    pub metric_value: Option<f64>,
    pub metadata: Option<serde_json::Value>,
}

/// Frontend event enriched with request context at admission time.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedEvent {
    #[serde(flatten)]
    pub event: FrontendEvent,
    pub ip: String,
    pub user_agent: String,
    /// Country resolved from the client IP (best effort, may be empty).
    pub resolved_country: String,
}

/// Backend API call metric reported by internal services.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApiMetric {
    #[serde(default)]
    pub time: DateTime<Utc>,
    #[validate(length(min = 1, max = 64))]
    pub service_name: String,
    #[validate(length(min = 1, max = 2048))]
    pub endpoint: String,
    #[validate(length(min = 1, max = 16))]
    pub method: String,
    #[validate(range(min = 0.0, max = 600000.0))]
    pub duration_ms: f64,
    #[validate(range(min = 0, max = 999))]
    pub status_code: i32,
    #[validate(length(max = 128))]
    pub player_id: Option<String>,
    #[validate(length(max = 128))]
    pub request_id: Option<String>,
    #[validate(length(max = 64))]
    pub error_type: Option<String>,
    #[validate(length(max = 2000))]
    pub error_message: Option<String>,
    #[validate(range(min = 0))]
    pub request_size: Option<i64>,
    #[validate(range(min = 0))]
    pub response_size: Option<i64>,
    pub metadata: Option<serde_json::Value>,
}

/// Payment service provider call (deposit, withdrawal, refund...).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PspMetric {
    #[serde(default)]
    pub time: DateTime<Utc>,
    #[validate(length(min = 1, max = 64))]
    pub psp_name: String,
    #[validate(length(min = 1, max = 64))]
    pub operation: String,
    #[validate(range(min = 0.0, max = 600000.0))]
    pub duration_ms: f64,
    pub success: bool,
    #[validate(length(max = 128))]
    pub player_id: Option<String>,
    #[validate(length(max = 128))]
    pub transaction_id: Option<String>,
    #[validate(range(min = 0.0))]
    pub amount: Option<f64>,
    #[validate(length(max = 3))]
    pub currency: Option<String>,
    #[validate(length(max = 64))]
    pub error_code: Option<String>,
    #[validate(length(max = 2000))]
    pub error_message: Option<String>,
    #[validate(length(max = 64))]
    pub psp_response_code: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Game provider launch metric.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GameMetric {
    #[serde(default)]
    pub time: DateTime<Utc>,
    #[validate(length(min = 1, max = 64))]
    pub provider: String,
    #[validate(length(min = 1, max = 128))]
    pub game_id: String,
    #[validate(length(max = 64))]
    pub game_type: Option<String>,
    #[validate(range(min = 0.0, max = 600000.0))]
    pub load_time_ms: Option<f64>,
    pub launch_success: bool,
    #[validate(length(max = 128))]
    pub player_id: Option<String>,
    #[validate(length(max = 128))]
    pub session_id: Option<String>,
    #[validate(length(max = 64))]
    pub device_type: Option<String>,
    #[validate(length(max = 64))]
    pub error_type: Option<String>,
    #[validate(length(max = 2000))]
    pub error_message: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// WebSocket connection lifecycle metric.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WebSocketMetric {
    #[serde(default)]
    pub time: DateTime<Utc>,
    #[validate(length(min = 1, max = 128))]
    pub connection_id: String,
    #[validate(length(max = 128))]
    pub player_id: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub event_type: String,
    #[validate(range(min = 0.0, max = 600000.0))]
    pub latency_ms: Option<f64>,
    #[validate(range(min = 0))]
    pub messages_sent: Option<i64>,
    #[validate(range(min = 0))]
    pub messages_received: Option<i64>,
    pub close_code: Option<i32>,
    #[validate(length(max = 2000))]
    pub close_reason: Option<String>,
    #[validate(length(max = 2048))]
    pub endpoint: Option<String>,
    #[validate(length(max = 64))]
    pub device_type: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// A single event travelling through the ingestion pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum IngestEvent {
    Frontend(EnrichedEvent),
    Api(ApiMetric),
    Psp(PspMetric),
    Game(GameMetric),
    #[serde(rename = "websocket")]
    WebSocket(WebSocketMetric),
}

impl IngestEvent {
    pub fn category(&self) -> Category {
        match self {
            Self::Frontend(_) => Category::Frontend,
            Self::Api(_) => Category::Api,
            Self::Psp(_) => Category::Psp,
            Self::Game(_) => Category::Game,
            Self::WebSocket(_) => Category::WebSocket,
        }
    }

    /// Event timestamp.
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            Self::Frontend(e) => e.event.time,
            Self::Api(m) => m.time,
            Self::Psp(m) => m.time,
            Self::Game(m) => m.time,
            Self::WebSocket(m) => m.time,
        }
    }

    fn time_mut(&mut self) -> &mut DateTime<Utc> {
        match self {
            Self::Frontend(e) => &mut e.event.time,
            Self::Api(m) => &mut m.time,
            Self::Psp(m) => &mut m.time,
            Self::Game(m) => &mut m.time,
            Self::WebSocket(m) => &mut m.time,
        }
    }

    /// Replaces an absent or implausible timestamp with `now`.
    pub fn normalize(mut self, now: DateTime<Utc>) -> Self {
        let time = self.time_mut();
        *time = normalize_time(*time, now);
        self
    }
}

impl From<EnrichedEvent> for IngestEvent {
    fn from(event: EnrichedEvent) -> Self {
        Self::Frontend(event)
    }
}

impl From<ApiMetric> for IngestEvent {
    fn from(metric: ApiMetric) -> Self {
        Self::Api(metric)
    }
}

impl From<PspMetric> for IngestEvent {
    fn from(metric: PspMetric) -> Self {
        Self::Psp(metric)
    }
}

impl From<GameMetric> for IngestEvent {
    fn from(metric: GameMetric) -> Self {
        Self::Game(metric)
    }
}

impl From<WebSocketMetric> for IngestEvent {
    fn from(metric: WebSocketMetric) -> Self {
        Self::WebSocket(metric)
    }
}

/// Frontend SDK payload: `{ "events": [...] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct FrontendBatch {
    #[serde(default)]
    pub events: Vec<FrontendEvent>,
}

/// Backend service payload: `{ "metrics": [...] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricBatch<T> {
    #[serde(default = "Vec::new")]
    pub metrics: Vec<T>,
}
