//! Application state shared across handlers.

use collector::BatchCollector;
use pulse_storage::MetricsStore;
use std::sync::Arc;

use crate::config::ApiConfig;
use crate::middleware::rate_limit::SharedRateLimiter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Batching collector fed by the ingestion handlers
    pub collector: Arc<BatchCollector>,
    /// Read side for health probes and the dashboard
    pub store: Arc<dyn MetricsStore>,
    /// Per-IP admission control for ingestion routes
    pub rate_limiter: SharedRateLimiter,
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(
        collector: Arc<BatchCollector>,
        store: Arc<dyn MetricsStore>,
        rate_limiter: SharedRateLimiter,
        config: ApiConfig,
    ) -> Self {
        Self {
            collector,
            store,
            rate_limiter,
            config,
        }
    }
}
