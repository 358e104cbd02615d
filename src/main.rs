//! Product Pulse ingestion service
//!
//! Accepts frontend, API, PSP, game and WebSocket telemetry over HTTP,
//! applies per-IP admission control, batches events per category and bulk
//! writes them to TimescaleDB. Serves the dashboard read API from the
//! continuous aggregates.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tracing::{error, info, warn};

use api::middleware::rate_limit::{RateLimitConfig, RateLimiter};
use api::{router, ApiConfig, AppState};
use collector::{BatchCollector, CollectorConfig, EventSink};
use pulse_core::duration::parse_duration;
use pulse_storage::{health::check_connection, schema, MetricsStore, PgStore, StorageConfig};
use telemetry::{init_tracing, TracingConfig};

/// Flat process settings, one field per environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Settings {
    host: String,
    port: u16,

    database_url: String,
    db_max_connections: usize,
    init_schema: bool,

    batch_size: usize,
    flush_interval: String,
    workers: usize,
    queue_capacity: usize,
    drain_timeout: String,

    allowed_origins: String,
    max_body_size: usize,

    rate_limit_enabled: bool,
    rate_limit_rps: f64,
    rate_limit_burst: u32,
    rate_limit_sweep_interval: String,
    rate_limit_idle_timeout: String,
}

impl Default for Settings {
    fn default() -> Self {
        let storage = StorageConfig::default();
        let api = ApiConfig::default();
        let rate_limit = RateLimitConfig::default();

        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: storage.database_url,
            db_max_connections: storage.max_connections,
            init_schema: storage.init_schema,
            batch_size: 100,
            flush_interval: "5s".to_string(),
            workers: 4,
            queue_capacity: 10_000,
            drain_timeout: "10s".to_string(),
            allowed_origins: api.allowed_origins.join(","),
            max_body_size: api.max_body_size,
            rate_limit_enabled: rate_limit.enabled,
            rate_limit_rps: rate_limit.rps,
            rate_limit_burst: rate_limit.burst,
            rate_limit_sweep_interval: "1m".to_string(),
            rate_limit_idle_timeout: "3m".to_string(),
        }
    }
}

impl Settings {
    fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .context("Invalid server address")
    }

    fn storage(&self) -> StorageConfig {
        StorageConfig {
            database_url: self.database_url.clone(),
            max_connections: self.db_max_connections,
            init_schema: self.init_schema,
            ..StorageConfig::default()
        }
    }

    fn collector(&self) -> Result<CollectorConfig> {
        Ok(CollectorConfig::default()
            .with_batch_size(self.batch_size)
            .with_flush_interval(duration("FLUSH_INTERVAL", &self.flush_interval)?)
            .with_workers(self.workers)
            .with_queue_capacity(self.queue_capacity)
            .with_drain_timeout(duration("DRAIN_TIMEOUT", &self.drain_timeout)?))
    }

    fn rate_limit(&self) -> Result<RateLimitConfig> {
        let config = RateLimitConfig {
            enabled: self.rate_limit_enabled,
            rps: self.rate_limit_rps,
            burst: self.rate_limit_burst,
            sweep_interval: duration("RATE_LIMIT_SWEEP_INTERVAL", &self.rate_limit_sweep_interval)?,
            idle_timeout: duration("RATE_LIMIT_IDLE_TIMEOUT", &self.rate_limit_idle_timeout)?,
        };
        config.validate().context("Invalid rate limit configuration")?;
        Ok(config)
    }

    fn api(&self) -> ApiConfig {
        ApiConfig::default()
            .with_allowed_origins(ApiConfig::parse_origins(&self.allowed_origins))
            .with_max_body_size(self.max_body_size)
    }
}

fn duration(key: &str, value: &str) -> Result<Duration> {
    parse_duration(value).with_context(|| format!("Invalid {key}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing(TracingConfig::from_env());

    info!("Starting Product Pulse v{}", env!("CARGO_PKG_VERSION"));

    let settings = load_settings()?;
    let addr = settings.addr()?;
    let storage_config = settings.storage();
    let collector_config = settings.collector()?;
    let rate_limit_config = settings.rate_limit()?;
    let api_config = settings.api();

    info!(
        workers = collector_config.workers,
        batch_size = collector_config.batch_size,
        flush_interval_ms = collector_config.flush_interval.as_millis() as u64,
        rate_limit_enabled = rate_limit_config.enabled,
        "Loaded configuration"
    );

    let store = Arc::new(
        PgStore::connect(&storage_config)
            .await
            .context("Failed to connect to database")?,
    );

    if storage_config.init_schema {
        schema::init_schema(&store)
            .await
            .context("Failed to initialize schema")?;
        info!("Database schema initialized");
    }

    if !check_connection(&*store).await {
        warn!("Database health check failed at startup");
    }

    let sink: Arc<dyn EventSink> = store.clone();
    let collector =
        BatchCollector::start(collector_config, sink).context("Failed to start collector")?;

    let rate_limiter = Arc::new(RateLimiter::new(rate_limit_config));
    let sweeper = rate_limiter.spawn_sweeper();

    let metrics_store: Arc<dyn MetricsStore> = store.clone();
    let state = AppState::new(collector.clone(), metrics_store, rate_limiter, api_config);
    let app = router(state);

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Client IPs fall back to the peer address.
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    info!("Shutting down...");

    collector.close().await;
    sweeper.shutdown().await;

    let stats = collector.stats();
    info!(
        received = stats.received,
        flushed = stats.flushed,
        dropped = stats.dropped,
        failed = stats.failed_events,
        "Collector drained"
    );

    store.close();

    served.context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Load settings from defaults, `config/default.toml` and the environment.
fn load_settings() -> Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::Config::try_from(&Settings::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(config::Environment::default().try_parsing(true))
        .build()
        .context("Failed to build configuration")?;

    settings
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
