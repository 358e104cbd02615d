//! Admission-time enrichment and timestamp normalization.
//!
//! Runs once per event in the HTTP layer, before the event is pushed into
//! the collector. The collector itself trusts every timestamp it receives.

use chrono::{DateTime, Utc};

use crate::events::{EnrichedEvent, FrontendEvent};
use crate::limits::MAX_CLOCK_DRIFT;

/// Keeps `ts` if it is within [`MAX_CLOCK_DRIFT`] of `now`, otherwise returns `now`.
///
/// Absent timestamps arrive as the Unix epoch and are always replaced.
pub fn normalize_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let drift = if now >= ts { now - ts } else { ts - now };
    match drift.to_std() {
        Ok(drift) if drift <= MAX_CLOCK_DRIFT => ts,
        _ => now,
    }
}

/// Resolves a country code for a client IP.
///
/// Geo-IP lookup is not wired in; the store keeps whatever the client sent.
pub fn resolve_country(_ip: &str) -> String {
    String::new()
}

/// Attaches request context to a frontend event and normalizes its timestamp.
///
/// The resolved country only fills in a missing or empty client country.
pub fn enrich_frontend(
    mut event: FrontendEvent,
    ip: &str,
    user_agent: &str,
    country: &str,
    now: DateTime<Utc>,
) -> EnrichedEvent {
    if event.country.as_deref().map_or(true, str::is_empty) {
        event.country = Some(country.to_string());
    }
    event.time = normalize_time(event.time, now);

    EnrichedEvent {
        event,
        ip: ip.to_string(),
        user_agent: user_agent.to_string(),
        resolved_country: country.to_string(),
    }
}
