//! Error Types for the Lookup API
//!
//! This module defines error handling for the HTTP layer:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//! - Conversion from the library-level `LookupError`
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lookup_core::{LookupError, SourceError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code and represents
/// a category of error that can occur while serving lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Request body could not be parsed
    InvalidInput,

    // ========================================================================
    // Server Errors (500, 503, 504)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Database query failed
    DatabaseError,

    /// Data source or its pool is unreachable
    ServiceUnavailable,

    /// Database connection pool exhausted
    ConnectionPoolExhausted,

    /// Batch exceeded its time budget
    Timeout,

    /// Request was abandoned before completion
    Cancelled,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationFailed | ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,

            ErrorCode::ServiceUnavailable
            | ErrorCode::ConnectionPoolExhausted
            | ErrorCode::Cancelled => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::ConnectionPoolExhausted => "Connection pool exhausted",
            ErrorCode::Timeout => "Operation timed out",
            ErrorCode::Cancelled => "Request cancelled",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (per-field validation errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    /// Create a ValidationFailed error.
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create an InternalError.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a DatabaseError.
    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Create a ServiceUnavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Request field a validation error refers to, in wire (camelCase) naming.
pub fn validation_field(err: &ValidationError) -> String {
    match err {
        ValidationError::InvalidLookupKey { .. } => "lookupKey".to_string(),
        ValidationError::InvalidPage { .. } => "page".to_string(),
        ValidationError::InvalidPageSize { .. } => "pageSize".to_string(),
        ValidationError::BatchTooLarge { .. } | ValidationError::EmptyBatch => {
            "requests".to_string()
        }
        ValidationError::InvalidParameter { name, .. } => format!("parameters.{name}"),
        ValidationError::InvalidIdentifier { .. } => "identifier".to_string(),
    }
}

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::Validation(v) => ApiError::validation_failed(v.to_string())
                .with_details(json!([{ "field": validation_field(&v), "message": v.to_string() }])),
            LookupError::Source(SourceError::Pool { reason }) => {
                tracing::error!("Connection pool error: {}", reason);
                ApiError::from_code(ErrorCode::ConnectionPoolExhausted)
            }
            LookupError::Source(source @ SourceError::Connection { .. }) => {
                tracing::error!("Data source unavailable: {}", source);
                ApiError::service_unavailable("Lookup data source is unavailable")
            }
            LookupError::Source(source) => {
                // Logged in full; the response stays generic.
                tracing::error!("Data source error: {}", source);
                ApiError::database_error("Lookup query failed")
            }
            LookupError::Cancelled { .. } => ApiError::from_code(ErrorCode::Cancelled),
            LookupError::Timeout { after } => ApiError::new(
                ErrorCode::Timeout,
                format!("Lookup batch timed out after {} ms", after.as_millis()),
            ),
            other @ (LookupError::Cache(_) | LookupError::Config(_) | LookupError::Internal { .. }) => {
                tracing::error!("Internal lookup error: {}", other);
                ApiError::from_code(ErrorCode::InternalError)
            }
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::ValidationFailed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InternalError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::ServiceUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorCode::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_validation_error_carries_field() {
        let err: ApiError =
            LookupError::from(ValidationError::InvalidPageSize { page_size: 500, max: 100 }).into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        let details = err.details.unwrap();
        assert_eq!(details[0]["field"], "pageSize");
    }

    #[test]
    fn test_source_errors_do_not_leak_details() {
        let err: ApiError = LookupError::from(SourceError::Query {
            table: "AppUsers".to_string(),
            reason: "syntax error at or near".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("syntax"));

        let err: ApiError = LookupError::from(SourceError::Connection {
            source_name: "postgres".to_string(),
            reason: "refused".to_string(),
        })
        .into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_timeout_maps_to_gateway_timeout() {
        let err: ApiError = LookupError::Timeout {
            after: Duration::from_millis(250),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert!(err.message.contains("250"));
    }

    #[test]
    fn test_error_serialization() {
        let err = ApiError::validation_failed("bad");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"code\":\"VALIDATION_FAILED\""));
        assert!(!json.contains("details"));
    }
}
