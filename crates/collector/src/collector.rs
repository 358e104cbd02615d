//! Bounded queue plus worker pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pulse_core::{IngestEvent, Result};
use telemetry::metrics;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::batch::{BatchAccumulator, EventBatch};
use crate::config::CollectorConfig;
use crate::sink::EventSink;
use crate::stats::{CollectorStats, StatsSnapshot};

/// A queued event and the instant it was accepted. Flush deadlines count
/// from here, so time spent waiting in the queue is part of the bound.
struct Queued {
    event: IngestEvent,
    enqueued_at: Instant,
}

type SharedReceiver = Arc<AsyncMutex<mpsc::Receiver<Queued>>>;

/// Upper bound on events a worker takes from the queue per receive.
const MAX_PULL: usize = 1024;

/// Decouples request handlers from storage writes.
///
/// `push` is synchronous and never waits: a full queue drops the newest event.
/// Workers share one receiver and keep one open batch per category each.
pub struct BatchCollector {
    config: CollectorConfig,
    tx: mpsc::Sender<Queued>,
    rx: SharedReceiver,
    stats: Arc<CollectorStats>,
    closed: AtomicBool,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl BatchCollector {
    /// Spawns `config.workers` worker tasks on the current runtime.
    pub fn start(config: CollectorConfig, sink: Arc<dyn EventSink>) -> Result<Arc<Self>> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let rx: SharedReceiver = Arc::new(AsyncMutex::new(rx));
        let stats = Arc::new(CollectorStats::new());
        let shutdown = CancellationToken::new();

        let workers = (0..config.workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    rx: rx.clone(),
                    sink: sink.clone(),
                    stats: stats.clone(),
                    shutdown: shutdown.clone(),
                    batches: BatchAccumulator::new(config.batch_size, config.flush_interval),
                    pull: config.batch_size.min(MAX_PULL),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        info!(
            workers = config.workers,
            batch_size = config.batch_size,
            flush_interval_ms = config.flush_interval.as_millis() as u64,
            queue_capacity = config.queue_capacity,
            "collector started"
        );

        Ok(Arc::new(Self {
            config,
            tx,
            rx,
            stats,
            closed: AtomicBool::new(false),
            shutdown,
            workers: Mutex::new(workers),
        }))
    }

    /// Offers an event to the queue. Returns false if it was dropped.
    pub fn push(&self, event: IngestEvent) -> bool {
        self.stats.received.inc();

        if self.closed.load(Ordering::Acquire) {
            self.stats.dropped.inc();
            return false;
        }

        let queued = Queued {
            event,
            enqueued_at: Instant::now(),
        };
        match self.tx.try_send(queued) {
            Ok(()) => {
                self.stats.enqueued.inc();
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) | Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.inc();
                false
            }
        }
    }

    /// Current counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.queue_depth() as u64)
    }

    /// Events waiting in the queue.
    pub fn queue_depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops intake, drains the queue and flushes open batches.
    ///
    /// The drain is bounded by `drain_timeout`; whatever has not been handed to
    /// the sink by then is counted as dropped. Calling `close` again is a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.cancel();

        let mut workers = std::mem::take(&mut *self.workers.lock());
        let drained = tokio::time::timeout(self.config.drain_timeout, async {
            for handle in workers.iter_mut() {
                if let Err(e) = handle.await {
                    error!(error = %e, "collector worker failed");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                timeout_ms = self.config.drain_timeout.as_millis() as u64,
                "collector drain timed out, aborting workers"
            );
            for handle in &workers {
                handle.abort();
            }
            for handle in workers {
                let _ = handle.await;
            }
            self.stats.dropped.inc_by(self.stats.pending.take());
        }

        let mut rx = self.rx.lock().await;
        rx.close();
        let mut leftover = 0u64;
        while rx.try_recv().is_ok() {
            leftover += 1;
        }
        self.stats.dropped.inc_by(leftover);

        let snapshot = self.stats();
        info!(
            received = snapshot.received,
            flushed = snapshot.flushed,
            dropped = snapshot.dropped,
            failed_events = snapshot.failed_events,
            "collector closed"
        );
    }
}

struct Worker {
    id: usize,
    rx: SharedReceiver,
    sink: Arc<dyn EventSink>,
    stats: Arc<CollectorStats>,
    shutdown: CancellationToken,
    batches: BatchAccumulator,
    pull: usize,
}

impl Worker {
    async fn run(mut self) {
        debug!(worker = self.id, "collector worker started");

        loop {
            let deadline = self.batches.next_deadline();
            let rx = self.rx.clone();
            let pull = self.pull;

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,

                received = async move {
                    let mut received = Vec::with_capacity(pull);
                    rx.lock().await.recv_many(&mut received, pull).await;
                    received
                } => {
                    if received.is_empty() {
                        break;
                    }
                    self.stats.pending.add(received.len() as u64);
                    for queued in received {
                        self.accept(queued).await;
                    }
                    // A steady backlog keeps this arm winning, so deadlines
                    // are checked here as well as on the timer.
                    self.flush_expired().await;
                }

                _ = sleep_until(deadline) => self.flush_expired().await,
            }
        }

        self.drain().await;
        debug!(worker = self.id, "collector worker stopped");
    }

    /// Batches one event. The caller has already counted it as pending.
    async fn accept(&mut self, queued: Queued) {
        if let Some(batch) = self.batches.add(queued.event, queued.enqueued_at) {
            self.flush(batch).await;
        }
    }

    async fn flush_expired(&mut self) {
        for batch in self.batches.take_expired(Instant::now()) {
            self.flush(batch).await;
        }
    }

    /// Empties the queue, then flushes partial batches once.
    async fn drain(&mut self) {
        loop {
            let next = self.rx.lock().await.try_recv();
            match next {
                Ok(queued) => {
                    self.stats.pending.add(1);
                    self.accept(queued).await;
                }
                Err(_) => break,
            }
        }

        for batch in self.batches.take_all() {
            self.flush(batch).await;
        }
    }

    async fn flush(&self, batch: EventBatch) {
        let count = batch.len() as u64;
        let category = batch.category();
        let start = Instant::now();

        match self.sink.write(batch).await {
            Ok(()) => {
                let elapsed = start.elapsed();
                self.stats.flushed.inc_by(count);
                metrics().batches_flushed.inc();
                metrics().flush_latency_ms.observe(elapsed.as_millis() as u64);
                debug!(
                    worker = self.id,
                    category = %category,
                    count,
                    latency_ms = elapsed.as_millis() as u64,
                    "flushed batch"
                );
            }
            Err(e) => {
                self.stats.flush_errors.inc();
                self.stats.failed_events.inc_by(count);
                metrics().batch_flush_errors.inc();
                error!(
                    worker = self.id,
                    category = %category,
                    count,
                    error = %e,
                    "failed to flush batch"
                );
            }
        }

        self.stats.pending.sub(count);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
