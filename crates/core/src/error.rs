//! Unified error types for the ingestion service.
//!
//! Error codes surfaced over HTTP:
//! - VALID_001: Malformed or invalid input
//! - BODY_001: Request body too large
//! - RATE_001: Rate limit exceeded
//! - DB_001: Storage errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    /// VALID_001: Invalid JSON / invalid field values
    InvalidFormat,
    /// BODY_001: Body exceeds the configured size cap
    BodyTooLarge,
}

impl ValidationErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "VALID_001",
            Self::BodyTooLarge => "BODY_001",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidFormat => 400,
            Self::BodyTooLarge => 413,
        }
    }
}

/// Database error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorCode {
    /// DB_001: Failed to read or write the store
    StoreFailed,
}

impl DbErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::StoreFailed => "DB_001",
        }
    }
}

/// Unified error type for the ingestion service.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage error with code.
    #[error("[{code}] {message}")]
    Database { code: &'static str, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a storage error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database {
            code: DbErrorCode::StoreFailed.code(),
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Serialization(_) => 400,
            Self::Database { .. } | Self::Config(_) | Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Database { code, .. } => Some(code),
            Self::Validation(_) | Self::Serialization(_) => {
                Some(ValidationErrorCode::InvalidFormat.code())
            }
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
