//! Database health checks.

use telemetry::health;
use tracing::{debug, error};

use crate::query::MetricsStore;

/// Pings the database and records the outcome in the global health registry.
pub async fn check_connection(store: &dyn MetricsStore) -> bool {
    match store.ping().await {
        Ok(()) => {
            debug!("database connection healthy");
            health().database.set_healthy();
            true
        }
        Err(e) => {
            error!(error = %e, "database health check failed");
            health().database.set_unhealthy(e.to_string());
            false
        }
    }
}
