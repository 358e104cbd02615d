//! Collector counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use telemetry::{Counter, Gauge};

/// Live collector counters. Every field is independently incremented from
/// handler and worker tasks; reads never block.
#[derive(Debug, Default)]
pub struct CollectorStats {
    /// Every `push` call.
    pub received: Counter,
    /// Accepted into the queue.
    pub enqueued: Counter,
    /// Rejected by a full or closed queue, or lost to an aborted drain.
    pub dropped: Counter,
    /// Written by the sink.
    pub flushed: Counter,
    /// Failed sink calls (one per batch).
    pub flush_errors: Counter,
    /// Events discarded with a failed batch.
    pub failed_events: Counter,
    /// Events held in worker batches, not yet handed to the sink.
    pub pending: Gauge,
}

impl CollectorStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time copy of the counters. `queued` is supplied by the
    /// collector since the queue depth lives in the channel.
    pub fn snapshot(&self, queued: u64) -> StatsSnapshot {
        StatsSnapshot {
            timestamp: Utc::now(),
            received: self.received.get(),
            enqueued: self.enqueued.get(),
            dropped: self.dropped.get(),
            flushed: self.flushed.get(),
            flush_errors: self.flush_errors.get(),
            failed_events: self.failed_events.get(),
            queued,
            pending: self.pending.get(),
        }
    }
}

/// A snapshot of collector counters, served by `GET /metrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub received: u64,
    pub enqueued: u64,
    pub dropped: u64,
    pub flushed: u64,
    pub flush_errors: u64,
    pub failed_events: u64,
    pub queued: u64,
    pub pending: u64,
}

impl StatsSnapshot {
    /// Events accepted but not yet flushed or failed.
    pub fn in_flight(&self) -> u64 {
        self.queued + self.pending
    }

    /// `received == flushed + dropped + failed_events + in flight`.
    pub fn is_balanced(&self) -> bool {
        self.received == self.flushed + self.dropped + self.failed_events + self.in_flight()
    }
}
