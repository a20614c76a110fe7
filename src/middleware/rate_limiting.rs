// ABOUTME: Rate limit response headers for daily quota decisions
// ABOUTME: Renders X-RateLimit-* and Retry-After from a quota decision
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Rate Limiting Headers
//!
//! Generation responses carry the caller's daily quota state so clients can
//! show remaining requests; denials add `Retry-After`.

use http::{HeaderMap, HeaderValue};

use crate::rate_limiting::RateLimitInfo;

/// HTTP header names for rate limiting
pub mod headers {
    /// HTTP header name for maximum requests allowed in the current window
    pub const X_RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
    /// HTTP header name for remaining requests in the current window
    pub const X_RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
    /// HTTP header name for Unix timestamp when the window resets
    pub const X_RATE_LIMIT_RESET: &str = "x-ratelimit-reset";
    /// HTTP header name for the caller's tier
    pub const X_RATE_LIMIT_TIER: &str = "x-ratelimit-tier";
    /// HTTP header name for retry-after duration in seconds
    pub const RETRY_AFTER: &str = "retry-after";
}

/// Create a `HeaderMap` with rate limit headers
#[must_use]
pub fn create_rate_limit_headers(info: &RateLimitInfo, tier: &str) -> HeaderMap {
    let mut map = HeaderMap::new();

    map.insert(headers::X_RATE_LIMIT_LIMIT, HeaderValue::from(info.limit));
    map.insert(headers::X_RATE_LIMIT_REMAINING, HeaderValue::from(info.remaining));
    map.insert(
        headers::X_RATE_LIMIT_RESET,
        HeaderValue::from(info.reset_at.timestamp()),
    );

    if let Ok(value) = HeaderValue::from_str(tier) {
        map.insert(headers::X_RATE_LIMIT_TIER, value);
    }

    if let Some(retry_after) = info.retry_after {
        map.insert(
            headers::RETRY_AFTER,
            HeaderValue::from(retry_after.as_secs().max(1)),
        );
    }

    map
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_headers_for_denial() {
        let info = RateLimitInfo {
            limit: 3,
            remaining: 0,
            reset_at: Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap(),
            retry_after: Some(Duration::from_secs(120)),
        };
        let map = create_rate_limit_headers(&info, "guest");

        assert_eq!(map[headers::X_RATE_LIMIT_LIMIT], "3");
        assert_eq!(map[headers::X_RATE_LIMIT_REMAINING], "0");
        assert_eq!(map[headers::X_RATE_LIMIT_RESET], "1741651200");
        assert_eq!(map[headers::X_RATE_LIMIT_TIER], "guest");
        assert_eq!(map[headers::RETRY_AFTER], "120");
    }

    #[test]
    fn test_no_retry_after_when_allowed() {
        let info = RateLimitInfo {
            limit: 10,
            remaining: 7,
            reset_at: Utc::now(),
            retry_after: None,
        };
        let map = create_rate_limit_headers(&info, "registered");
        assert!(map.get(headers::RETRY_AFTER).is_none());
        assert_eq!(map[headers::X_RATE_LIMIT_REMAINING], "7");
    }
}
