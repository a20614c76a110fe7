// ABOUTME: Error types for calls to the external image-generation API
// ABOUTME: Classifies upstream failures so the orchestrator can decide on retries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AppError, ErrorCode};

/// Classification of an upstream failure
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamErrorKind {
    /// The provider throttled us
    RateLimited,
    /// The provider refused the prompt or produced no usable image
    InvalidContent,
    /// Network failure, provider-side timeout, or 5xx
    Transient,
    /// Anything the provider returned that we do not recognise
    Unknown,
}

impl UpstreamErrorKind {
    /// Short label used in partial-failure notes and logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::InvalidContent => "invalid_content",
            Self::Transient => "transient",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed call to the image-generation provider
#[derive(Debug, Clone, Error)]
#[error("{kind} upstream error: {message}")]
pub struct UpstreamError {
    /// Failure classification
    pub kind: UpstreamErrorKind,
    /// Provider message, safe to show to the caller
    pub message: String,
}

impl UpstreamError {
    /// Create an upstream error of the given kind
    pub fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Provider throttled the call
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::RateLimited, message)
    }

    /// Provider rejected the content
    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::InvalidContent, message)
    }

    /// Temporary failure worth one retry
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Transient, message)
    }

    /// Unclassified failure
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Unknown, message)
    }

    /// Only transient failures are retried
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, UpstreamErrorKind::Transient)
    }
}

impl From<UpstreamError> for AppError {
    fn from(error: UpstreamError) -> Self {
        let code = match error.kind {
            UpstreamErrorKind::RateLimited => ErrorCode::ExternalRateLimited,
            UpstreamErrorKind::InvalidContent => ErrorCode::ExternalContentRejected,
            UpstreamErrorKind::Transient => ErrorCode::ExternalServiceUnavailable,
            UpstreamErrorKind::Unknown => ErrorCode::ExternalServiceError,
        };
        Self::new(code, error.message.clone()).with_source(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(UpstreamError::transient("503").is_retryable());
        assert!(!UpstreamError::rate_limited("429").is_retryable());
        assert!(!UpstreamError::invalid_content("blocked").is_retryable());
        assert!(!UpstreamError::unknown("418").is_retryable());
    }

    #[test]
    fn test_conversion_to_app_error() {
        let app: AppError = UpstreamError::rate_limited("slow down").into();
        assert_eq!(app.code, ErrorCode::ExternalRateLimited);
        assert_eq!(app.message, "slow down");
    }
}
