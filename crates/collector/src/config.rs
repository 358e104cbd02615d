//! Collector configuration.

use pulse_core::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Batching collector configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Maximum events per batch before flush
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum age of a batch, measured from its first event
    #[serde(
        default = "default_flush_interval",
        deserialize_with = "pulse_core::duration::deserialize"
    )]
    pub flush_interval: Duration,
    /// Number of worker tasks draining the queue
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Capacity of the bounded queue between handlers and workers
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Upper bound on the shutdown drain
    #[serde(
        default = "default_drain_timeout",
        deserialize_with = "pulse_core::duration::deserialize"
    )]
    pub drain_timeout: Duration,
}

fn default_batch_size() -> usize {
    100
}

fn default_flush_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_interval: default_flush_interval(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            drain_timeout: default_drain_timeout(),
        }
    }
}

impl CollectorConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Rejects zero sizes and intervals.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("BATCH_SIZE must be at least 1"));
        }
        if self.flush_interval.is_zero() {
            return Err(Error::config("FLUSH_INTERVAL must be positive"));
        }
        if self.workers == 0 {
            return Err(Error::config("WORKERS must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::config("QUEUE_CAPACITY must be at least 1"));
        }
        Ok(())
    }
}
