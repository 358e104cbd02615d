//! Human-readable durations for configuration values.
//!
//! Accepts `"500ms"`, `"5s"`, `"1m"`, `"2h"` or a bare number of milliseconds
//! (either as a string from the environment or as a TOML integer).

use serde::{Deserialize, Deserializer};
use std::time::Duration;

use crate::error::{Error, Result};

/// Parses a duration string.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| Error::config(format!("invalid duration: {input:?}")))?;

    match unit.trim() {
        "" | "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        other => Err(Error::config(format!(
            "invalid duration unit {other:?} in {input:?}"
        ))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Millis(u64),
    Text(String),
}

/// Serde `deserialize_with` adapter for [`parse_duration`].
pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match RawDuration::deserialize(deserializer)? {
        RawDuration::Millis(ms) => Ok(Duration::from_millis(ms)),
        RawDuration::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}
