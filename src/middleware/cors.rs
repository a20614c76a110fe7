// ABOUTME: CORS middleware configuration for HTTP API endpoints
// ABOUTME: Provides Cross-Origin Resource Sharing setup for web client access
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use http::header::HeaderName;
use http::{HeaderValue, Method};
use thumbanana_core::constants::identity::{GUEST_SESSION_HEADER, USER_ID_HEADER};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::ServerConfig;
use crate::middleware::{headers, REQUEST_ID_HEADER};

/// Configure CORS for the API
///
/// `CORS_ORIGINS="*"` allows any origin; otherwise it is a comma-separated
/// list. The guest session and rate limit headers are exposed so browser
/// clients can keep their session and show remaining quota.
pub fn setup_cors(config: &ServerConfig) -> CorsLayer {
    let wildcard = config.cors_origins.is_empty() || config.cors_origins.iter().any(|o| o == "*");

    let allow_origin = if wildcard {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
            .collect();
        if origins.is_empty() {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(origins)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("origin"),
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(GUEST_SESSION_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([
            HeaderName::from_static(GUEST_SESSION_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderName::from_static(headers::X_RATE_LIMIT_LIMIT),
            HeaderName::from_static(headers::X_RATE_LIMIT_REMAINING),
            HeaderName::from_static(headers::X_RATE_LIMIT_RESET),
            HeaderName::from_static(headers::X_RATE_LIMIT_TIER),
            HeaderName::from_static(headers::RETRY_AFTER),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
}
