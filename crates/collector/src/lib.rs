//! Batching collector for ingested telemetry.
//!
//! Request handlers push events into a bounded queue without awaiting. A fixed
//! pool of workers drains the queue into per-category batches and hands each
//! batch to an [`EventSink`] once it is full or old enough.

pub mod batch;
pub mod collector;
pub mod config;
pub mod sink;
pub mod stats;

pub use batch::EventBatch;
pub use collector::BatchCollector;
pub use config::CollectorConfig;
pub use sink::EventSink;
pub use stats::{CollectorStats, StatsSnapshot};
