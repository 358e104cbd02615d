//! Process telemetry for the ingestion service.
//!
//! Structured logging via `tracing`, in-process counters exposed through the
//! HTTP layer, and a component health registry.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
