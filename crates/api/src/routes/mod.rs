//! API routes.

pub mod dashboard;
pub mod health;
pub mod ingest;
pub mod metrics;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::middleware::rate_limit::enforce;
use crate::state::AppState;

/// Preflight cache lifetime.
const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let collect = Router::new()
        .route("/collect", post(ingest::collect_frontend))
        .route("/collect/api", post(ingest::collect_api))
        .route("/collect/psp", post(ingest::collect_psp))
        .route("/collect/game", post(ingest::collect_game))
        .route("/collect/ws", post(ingest::collect_ws))
        .route_layer(from_fn_with_state(state.rate_limiter.clone(), enforce));

    let dashboard = Router::new()
        .route("/api/metrics/overview", get(dashboard::overview))
        .route("/api/metrics/api", get(dashboard::api_performance))
        .route("/api/metrics/api/timeseries", get(dashboard::api_timeseries))
        .route("/api/metrics/psp", get(dashboard::psp_health))
        .route("/api/metrics/psp/timeseries", get(dashboard::psp_timeseries))
        .route("/api/metrics/vitals", get(dashboard::web_vitals))
        .route("/api/metrics/vitals/timeseries", get(dashboard::vitals_timeseries))
        .route("/api/metrics/games", get(dashboard::game_health))
        .route("/api/metrics/games/timeseries", get(dashboard::game_timeseries))
        .route("/api/alerts", get(dashboard::alerts))
        .route(
            "/api/alerts/:alert_time/acknowledge",
            post(dashboard::acknowledge_alert),
        );

    let body_limit = state.config.max_body_size;
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(collect)
        .merge(dashboard)
        .route("/metrics", get(metrics::metrics_handler))
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origin = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-site-id")])
        .max_age(CORS_MAX_AGE)
}
