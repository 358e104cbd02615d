//! Common test setup functions.

use api::middleware::rate_limit::{RateLimitConfig, RateLimiter, SharedRateLimiter};
use api::{router, ApiConfig, AppState};
use axum::Router;
use axum_test::TestServer;
use collector::{BatchCollector, CollectorConfig, StatsSnapshot};
use std::sync::Arc;
use std::time::Duration;

use crate::mocks::{MockSink, MockStore};

/// Knobs for building a [`TestContext`].
#[derive(Debug, Clone)]
pub struct TestOptions {
    pub collector: CollectorConfig,
    pub rate_limit: RateLimitConfig,
    pub api: ApiConfig,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            collector: CollectorConfig::default()
                .with_batch_size(50)
                .with_flush_interval(Duration::from_millis(50))
                .with_workers(2)
                .with_drain_timeout(Duration::from_secs(5)),
            rate_limit: RateLimitConfig::disabled(),
            api: ApiConfig::default(),
        }
    }
}

impl TestOptions {
    pub fn with_rate_limit(mut self, rps: f64, burst: u32) -> Self {
        self.rate_limit = RateLimitConfig::new(rps, burst);
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.api = self.api.with_max_body_size(max_body_size);
        self
    }

    pub fn with_allowed_origins(mut self, origins: &[&str]) -> Self {
        self.api = self
            .api
            .with_allowed_origins(origins.iter().map(|o| o.to_string()).collect());
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.collector = self.collector.with_queue_capacity(capacity);
        self
    }
}

/// Test context with the real router, collector and rate limiter wired to
/// in-memory mocks.
pub struct TestContext {
    pub sink: Arc<MockSink>,
    pub store: Arc<MockStore>,
    pub collector: Arc<BatchCollector>,
    pub rate_limiter: SharedRateLimiter,
    pub router: Router,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_options(TestOptions::default())
    }

    /// Must be called from within a Tokio runtime.
    pub fn with_options(options: TestOptions) -> Self {
        let sink = Arc::new(MockSink::new());
        let store = Arc::new(MockStore::new());

        let collector = BatchCollector::start(options.collector, sink.clone())
            .expect("collector config should be valid");
        let rate_limiter = Arc::new(RateLimiter::new(options.rate_limit));

        let state = AppState::new(
            collector.clone(),
            store.clone(),
            rate_limiter.clone(),
            options.api,
        );

        Self {
            sink,
            store,
            collector,
            rate_limiter,
            router: router(state),
        }
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(self.router.clone()).expect("Failed to create test server")
    }

    /// Closes the collector so every accepted event reaches the sink.
    pub async fn drain(&self) -> StatsSnapshot {
        self.collector.close().await;
        self.collector.stats()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
