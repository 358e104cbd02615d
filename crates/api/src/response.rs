//! Standardized API responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use pulse_core::error::ValidationErrorCode;
use serde::{Deserialize, Serialize};

/// Ingestion acknowledgement, sent before any flush happens.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    pub accepted: usize,
    pub rejected: usize,
}

impl IngestResponse {
    pub fn new(accepted: usize, rejected: usize) -> Self {
        Self {
            status: "ok".to_string(),
            accepted,
            rejected,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database_connected: bool,
    pub queue_depth: usize,
}

/// Plain `{"status": ...}` body used by probes and acknowledgements.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }
}

/// API error: status code plus a coded JSON body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new(msg, code),
            retry_after: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(
            StatusCode::BAD_REQUEST,
            ValidationErrorCode::InvalidFormat.code(),
            msg,
        )
    }

    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::with_code(
            StatusCode::PAYLOAD_TOO_LARGE,
            ValidationErrorCode::BodyTooLarge.code(),
            msg,
        )
    }

    pub fn rate_limited(msg: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            response: ErrorResponse::new(msg, "RATE_001"),
            retry_after,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::INTERNAL_SERVER_ERROR, "DB_001", msg)
    }

    pub fn validation(errors: Vec<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            response: ErrorResponse::new(
                "Validation failed",
                ValidationErrorCode::InvalidFormat.code(),
            )
            .with_details(errors),
            retry_after: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.response)).into_response();

        if let Some(retry_after) = self.retry_after {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl From<pulse_core::Error> for ApiError {
    fn from(err: pulse_core::Error) -> Self {
        match &err {
            pulse_core::Error::Validation(msg) => ApiError::bad_request(msg),
            pulse_core::Error::Serialization(e) => ApiError::bad_request(e.to_string()),
            pulse_core::Error::Database { code, message } => {
                ApiError::with_code(StatusCode::INTERNAL_SERVER_ERROR, *code, message)
            }
            _ => ApiError::internal(err.to_string()),
        }
    }
}
