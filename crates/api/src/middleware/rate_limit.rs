//! Per-IP rate limiting middleware.
//!
//! Lock discipline: each shard mutex guards only its own map and is never
//! held across an await or together with another shard's lock.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use pulse_core::{Error, Result};
use serde::Deserialize;
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::extractors::ClientIp;
use crate::response::ApiError;

const SHARD_COUNT: usize = 16;

/// Seconds a denied client is told to wait.
const RETRY_AFTER_SECS: u64 = 1;

/// Rate limiter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Tokens added per second
    #[serde(default = "default_rps")]
    pub rps: f64,
    /// Bucket capacity
    #[serde(default = "default_burst")]
    pub burst: u32,
    #[serde(
        default = "default_sweep_interval",
        deserialize_with = "pulse_core::duration::deserialize"
    )]
    pub sweep_interval: Duration,
    /// Entries not seen for this long are evicted by the sweeper
    #[serde(
        default = "default_idle_timeout",
        deserialize_with = "pulse_core::duration::deserialize"
    )]
    pub idle_timeout: Duration,
}

fn default_enabled() -> bool {
    true
}

fn default_rps() -> f64 {
    100.0
}

fn default_burst() -> u32 {
    200
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_idle_timeout() -> Duration {
    default_sweep_interval() * 3
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            rps: default_rps(),
            burst: default_burst(),
            sweep_interval: default_sweep_interval(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

impl RateLimitConfig {
    pub fn new(rps: f64, burst: u32) -> Self {
        Self {
            rps,
            burst,
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if !(self.rps.is_finite() && self.rps > 0.0) {
            return Err(Error::config("rate limit rps must be positive"));
        }
        if self.burst == 0 {
            return Err(Error::config("rate limit burst must be at least 1"));
        }
        if self.sweep_interval.is_zero() {
            return Err(Error::config("rate limit sweep interval must be positive"));
        }
        Ok(())
    }
}

/// Token bucket state for one client IP.
#[derive(Debug, Clone, Copy)]
struct IpLimiterEntry {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl IpLimiterEntry {
    fn full(burst: f64, now: Instant) -> Self {
        Self {
            tokens: burst,
            last_refill: now,
            last_seen: now,
        }
    }

    fn try_acquire(&mut self, rps: f64, burst: f64, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rps).min(burst);
        self.last_refill = now;
        self.last_seen = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

type Shard = Mutex<HashMap<String, IpLimiterEntry>>;

/// Sharded per-IP token bucket rate limiter.
pub struct RateLimiter {
    shards: Box<[Shard]>,
    hasher: RandomState,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shards,
            hasher: RandomState::new(),
            config,
        }
    }

    fn shard(&self, ip: &str) -> &Shard {
        let idx = self.hasher.hash_one(ip) as usize % self.shards.len();
        &self.shards[idx]
    }

    /// Returns true if a request from `ip` may proceed, consuming one token.
    pub fn allow(&self, ip: &str) -> bool {
        if !self.config.enabled {
            return true;
        }

        let now = Instant::now();
        let burst = f64::from(self.config.burst);
        let mut shard = self.shard(ip).lock();

        match shard.get_mut(ip) {
            Some(entry) => entry.try_acquire(self.config.rps, burst, now),
            None => {
                let mut entry = IpLimiterEntry::full(burst, now);
                let allowed = entry.try_acquire(self.config.rps, burst, now);
                shard.insert(ip.to_string(), entry);
                allowed
            }
        }
    }

    /// Evicts entries idle for longer than the configured timeout.
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let idle_timeout = self.config.idle_timeout;

        self.shards
            .iter()
            .map(|shard| {
                let mut map = shard.lock();
                let before = map.len();
                map.retain(|_, entry| now.duration_since(entry.last_seen) <= idle_timeout);
                before - map.len()
            })
            .sum()
    }

    /// Number of tracked IPs.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.lock().is_empty())
    }

    /// Spawns the background sweeper.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let token = CancellationToken::new();
        let limiter = Arc::clone(self);
        let cancel = token.clone();

        let task = tokio::spawn(async move {
            if !limiter.config.enabled {
                return;
            }

            let period = limiter.config.sweep_interval;
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = limiter.sweep();
                        if removed > 0 {
                            debug!(removed, remaining = limiter.len(), "swept idle rate limit entries");
                        }
                    }
                }
            }

            info!("rate limit sweeper stopped");
        });

        SweeperHandle { token, task }
    }
}

/// Handle to the background sweeper task.
pub struct SweeperHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the sweeper to stop without waiting.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Stops the sweeper and waits for the task to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Shared rate limiter state.
pub type SharedRateLimiter = Arc<RateLimiter>;

/// Axum middleware rejecting requests over the per-IP budget.
pub async fn enforce(
    State(limiter): State<SharedRateLimiter>,
    ClientIp(ip): ClientIp,
    request: Request,
    next: Next,
) -> Response {
    if limiter.allow(&ip) {
        return next.run(request).await;
    }

    metrics().rate_limited_requests.inc();
    debug!(ip = %ip, path = %request.uri().path(), "rate limit exceeded");
    ApiError::rate_limited("Rate limit exceeded", Some(RETRY_AFTER_SECS)).into_response()
}
