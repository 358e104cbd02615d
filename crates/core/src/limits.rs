//! Size, drift and range limits for ingested telemetry.
//!
//! The `#[validate]` derive macro requires literal values in attributes,
//! so field limits are duplicated there. Keep both in sync when modifying.

use std::time::Duration;

// === Request Limits ===

/// Default maximum request body size in bytes (1MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1 << 20;

// === Timestamp Bounds ===

/// Maximum accepted distance between an event timestamp and server time,
/// in either direction. Anything further away is replaced with "now".
pub const MAX_CLOCK_DRIFT: Duration = Duration::from_secs(3600);

// === String Field Limits (chars) ===

/// Identifier fields (session, player, request, transaction, connection ids).
pub const MAX_ID_LEN: usize = 128;

/// Short labels (device type, browser, method, currency, provider names).
pub const MAX_LABEL_LEN: usize = 64;

/// Country code (ISO 3166 alpha-2, some clients send alpha-3).
pub const MAX_COUNTRY_LEN: usize = 3;

/// Page paths and API endpoints.
pub const MAX_PATH_LEN: usize = 2048;

/// Free-form error messages and close reasons.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// User agent string max length.
pub const MAX_USER_AGENT_LEN: usize = 512;

// === Metric Bounds ===

/// Upper bound for any millisecond duration (10 minutes).
pub const MAX_DURATION_MS: f64 = 600_000.0;

/// CLS max value (Google considers >0.25 poor, 10 is extreme).
pub const MAX_CLS: f64 = 10.0;
