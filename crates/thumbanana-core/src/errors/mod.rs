// ABOUTME: Unified error type, error codes, and HTTP error response formatting
// ABOUTME: Every core component reports failures as AppError with a stable ErrorCode
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Unified Error Handling System
//!
//! This module provides a centralized error handling system for the Thumbanana
//! service. It defines standard error types, error codes, and HTTP response
//! formatting so the route layer can translate core failures without knowing
//! which component produced them.

/// Errors reported by the external image-generation API
pub mod upstream;

pub use upstream::{UpstreamError, UpstreamErrorKind};

use std::error::Error as StdError;
use std::fmt;
use std::io;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard error codes used throughout the application
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authorization
    /// Caller may not access the requested resource
    PermissionDenied,

    // Rate limiting
    /// Daily request quota exhausted for this identity
    QuotaExceeded,

    // Validation
    /// The provided input is invalid
    InvalidInput,
    /// A required field is missing from the request
    MissingRequiredField,
    /// The data format is invalid
    InvalidFormat,
    /// A value is outside the acceptable range
    ValueOutOfRange,
    /// A per-request limit of the caller's tier was exceeded
    LimitExceeded,
    /// One or more uploaded files were rejected
    UploadRejected,

    // Resource management
    /// The requested resource was not found
    ResourceNotFound,

    // External services
    /// The external service returned an error
    ExternalServiceError,
    /// The external service is unavailable or timed out
    ExternalServiceUnavailable,
    /// The external service rate limited the request
    ExternalRateLimited,
    /// The external service refused the content
    ExternalContentRejected,

    // Configuration
    /// Configuration error encountered
    ConfigError,
    /// Required configuration is missing
    ConfigMissing,
    /// Configuration is invalid
    ConfigInvalid,

    // Internal
    /// An internal server error occurred
    InternalError,
    /// Database operation failed
    DatabaseError,
    /// Artifact storage operation failed
    StorageError,
    /// Serialization or deserialization failed
    SerializationError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidInput
            | Self::MissingRequiredField
            | Self::InvalidFormat
            | Self::ValueOutOfRange
            | Self::LimitExceeded => 400,

            Self::PermissionDenied => 403,

            Self::ResourceNotFound => 404,

            Self::UploadRejected | Self::ExternalContentRejected => 422,

            Self::QuotaExceeded => 429,

            Self::ExternalServiceError => 502,

            Self::ExternalServiceUnavailable | Self::ExternalRateLimited => 503,

            Self::InternalError
            | Self::DatabaseError
            | Self::StorageError
            | Self::SerializationError
            | Self::ConfigError
            | Self::ConfigMissing
            | Self::ConfigInvalid => 500,
        }
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::PermissionDenied => "You do not have permission to perform this action",
            Self::QuotaExceeded => "Daily generation quota exceeded",
            Self::InvalidInput => "The provided input is invalid",
            Self::MissingRequiredField => "A required field is missing from the request",
            Self::InvalidFormat => "The data format is invalid",
            Self::ValueOutOfRange => "The provided value is outside the acceptable range",
            Self::LimitExceeded => "The request exceeds a limit of your account tier",
            Self::UploadRejected => "One or more uploaded files were rejected",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::ExternalServiceError => "The image generation service encountered an error",
            Self::ExternalServiceUnavailable => "The image generation service is unavailable",
            Self::ExternalRateLimited => "The image generation service is rate limiting requests",
            Self::ExternalContentRejected => "The image generation service rejected the content",
            Self::ConfigError => "Configuration error encountered",
            Self::ConfigMissing => "Required configuration is missing",
            Self::ConfigInvalid => "Configuration is invalid",
            Self::InternalError => "An internal server error occurred",
            Self::DatabaseError => "Database operation failed",
            Self::StorageError => "Storage operation failed",
            Self::SerializationError => "Data serialization/deserialization failed",
        }
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Structured details rendered into the error response
    pub details: serde_json::Value,
    /// Request ID for correlation, when known
    pub request_id: Option<String>,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: serde_json::Value::Null,
            request_id: None,
            source: None,
        }
    }

    /// Attach structured details
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Attach a request ID
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Whether this is a validation-class error (reported synchronously, never retried)
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::InvalidInput
                | ErrorCode::MissingRequiredField
                | ErrorCode::InvalidFormat
                | ErrorCode::ValueOutOfRange
                | ErrorCode::LimitExceeded
                | ErrorCode::UploadRejected
        )
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Missing required field
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("Missing required field '{field}'"),
        )
    }

    /// A per-request count outside its allowed range
    pub fn limit_exceeded(what: &str, requested: usize, min: usize, max: usize) -> Self {
        Self::new(
            ErrorCode::LimitExceeded,
            format!("Got {requested} {what}, allowed range is {min} to {max}"),
        )
        .with_details(serde_json::json!({
            "field": what,
            "requested": requested,
            "min": min,
            "max": max,
        }))
    }

    /// Daily quota exceeded
    pub fn quota_exceeded(limit: u32, reset_at: DateTime<Utc>, retry_after_secs: u64) -> Self {
        Self::new(
            ErrorCode::QuotaExceeded,
            format!("Daily limit of {limit} generation requests reached"),
        )
        .with_details(serde_json::json!({
            "limit": limit,
            "reset_at": reset_at.to_rfc3339(),
            "retry_after_secs": retry_after_secs,
        }))
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Artifact storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// External service error
    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("{}: {}", service.into(), message.into()),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// HTTP error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error body
    pub error: ErrorResponseDetails,
}

/// Body of an HTTP error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    /// Stable error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Request ID for correlation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Structured details
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: error.message,
                request_id: error.request_id,
                details: error.details,
            },
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(
            ErrorCode::SerializationError,
            format!("JSON processing failed: {error}"),
        )
        .with_source(error)
    }
}

impl From<io::Error> for AppError {
    fn from(error: io::Error) -> Self {
        Self::storage(format!("I/O operation failed: {error}")).with_source(error)
    }
}

#[cfg(feature = "database-errors")]
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        Self::database(format!("Database query failed: {error}")).with_source(error)
    }
}

#[cfg(feature = "http-response")]
mod http_response {
    use super::{AppError, ErrorResponse};
    use axum::response::{IntoResponse, Response};
    use axum::Json;
    use http::StatusCode;

    impl IntoResponse for AppError {
        fn into_response(self) -> Response {
            let status = StatusCode::from_u16(self.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                tracing::error!(code = ?self.code, error = %self, "Request failed");
            } else {
                tracing::debug!(code = ?self.code, error = %self, "Request rejected");
            }
            (status, Json(ErrorResponse::from(self))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::LimitExceeded.http_status(), 400);
        assert_eq!(ErrorCode::UploadRejected.http_status(), 422);
        assert_eq!(ErrorCode::QuotaExceeded.http_status(), 429);
        assert_eq!(ErrorCode::ResourceNotFound.http_status(), 404);
        assert_eq!(ErrorCode::DatabaseError.http_status(), 500);
    }

    #[test]
    fn test_validation_classification() {
        assert!(AppError::limit_exceeded("variants", 4, 1, 3).is_validation());
        assert!(AppError::invalid_input("bad").is_validation());
        assert!(!AppError::database("down").is_validation());
    }

    #[test]
    fn test_limit_exceeded_reports_the_field_range() {
        let error = AppError::limit_exceeded("reference_images", 2, 0, 1);
        assert_eq!(error.message, "Got 2 reference_images, allowed range is 0 to 1");
        assert_eq!(error.details["min"], 0);
        assert_eq!(error.details["max"], 1);
    }

    #[test]
    fn test_error_response_serialization() {
        let error = AppError::quota_exceeded(3, Utc::now(), 120).with_request_id("req-1");
        let response = ErrorResponse::from(error);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("QUOTA_EXCEEDED"));
        assert!(json.contains("retry_after_secs"));
        assert!(json.contains("req-1"));
    }
}
