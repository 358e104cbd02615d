//! Pooled PostgreSQL client.

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use pulse_core::{Error, Result};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::error::DbResultExt;

/// Connection-pooled store. Cheap to clone.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
    timeout: Duration,
}

impl PgStore {
    /// Builds the pool and verifies the database answers within
    /// `connect_timeout`.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let store = Self::lazy(config)?;
        store.ping().await?;

        info!(
            max_connections = config.max_connections,
            "connected to PostgreSQL"
        );
        Ok(store)
    }

    /// Builds the pool without opening a connection.
    pub fn lazy(config: &StorageConfig) -> Result<Self> {
        let pg_config: tokio_postgres::Config = config
            .database_url
            .parse()
            .map_err(|e| Error::config(format!("invalid DATABASE_URL: {e}")))?;

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .build()
            .map_err(|e| Error::config(format!("failed to build pool: {e}")))?;

        Ok(Self {
            pool,
            timeout: config.connect_timeout,
        })
    }

    /// Checks out a pooled connection.
    pub async fn get(&self) -> Result<Object> {
        self.pool.get().await.db_context("pool checkout")
    }

    /// Round trip to the database, bounded by the configured timeout.
    pub async fn ping(&self) -> Result<()> {
        let ping = async {
            let client = self.get().await?;
            client.simple_query("SELECT 1").await.db_context("ping")?;
            Ok::<_, Error>(())
        };

        tokio::time::timeout(self.timeout, ping)
            .await
            .map_err(|_| Error::database(format!("ping timed out after {:?}", self.timeout)))??;

        debug!("database ping ok");
        Ok(())
    }

    /// Pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            size: status.size,
            available: status.available as usize,
            waiting: status.waiting,
        }
    }

    /// Closes the pool; checked-out connections are dropped on return.
    pub fn close(&self) {
        self.pool.close();
    }
}

/// Pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: usize,
    pub available: usize,
    pub waiting: usize,
}
