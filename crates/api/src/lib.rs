//! HTTP API layer for the ingestion service.

pub mod config;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use routes::router;
pub use state::AppState;
