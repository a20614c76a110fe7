// ABOUTME: Daily request quota tracking for guests and registered users
// ABOUTME: Reserves one slot per generation request and computes reset and retry-after times
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Daily Quota Tracking
//!
//! Each identity may make a fixed number of generation requests per day. The
//! day is a calendar day in a configured UTC offset, and resets at local
//! midnight. Reservations are taken before any upstream work starts and are
//! never refunded, so a request that later fails still counts.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, FixedOffset, TimeZone, Utc};
use serde::Serialize;
use thumbanana_core::models::Identity;

use crate::database::{QuotaManager, ReservationOutcome};
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;

/// Which ceiling denied a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaScope {
    /// The identity's own daily ceiling
    Identity,
    /// The service-wide daily ceiling
    Global,
}

/// Outcome of [`QuotaTracker::check_and_reserve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    /// A slot was reserved
    Allowed {
        /// Requests counted today including this one
        count: u32,
        /// Ceiling applied
        limit: u32,
        /// Requests left today
        remaining: u32,
        /// When the daily window resets
        reset_at: DateTime<Utc>,
    },
    /// No slot left
    Denied {
        /// Ceiling applied
        limit: u32,
        /// Time until the window resets, never zero
        retry_after: Duration,
        /// When the daily window resets
        reset_at: DateTime<Utc>,
        /// Which ceiling was hit
        scope: QuotaScope,
    },
}

impl QuotaDecision {
    /// Whether the request may proceed
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// Header-ready view of the decision
    #[must_use]
    pub const fn rate_limit_info(&self) -> RateLimitInfo {
        match *self {
            Self::Allowed {
                limit,
                remaining,
                reset_at,
                ..
            } => RateLimitInfo {
                limit,
                remaining,
                reset_at,
                retry_after: None,
            },
            Self::Denied {
                limit,
                retry_after,
                reset_at,
                ..
            } => RateLimitInfo {
                limit,
                remaining: 0,
                reset_at,
                retry_after: Some(retry_after),
            },
        }
    }

    /// Convert a denial into the error returned to the caller
    ///
    /// # Errors
    ///
    /// Returns `QuotaExceeded` when the decision is a denial
    pub fn into_result(self) -> AppResult<Self> {
        match self {
            Self::Denied {
                limit,
                retry_after,
                reset_at,
                scope,
            } => {
                let error = AppError::quota_exceeded(limit, reset_at, retry_after.as_secs());
                Err(match scope {
                    QuotaScope::Identity => error,
                    QuotaScope::Global => AppError {
                        message: "The service has reached its daily generation limit".to_owned(),
                        ..error
                    },
                })
            }
            allowed @ Self::Allowed { .. } => Ok(allowed),
        }
    }
}

/// Rate limit information rendered into response headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Daily ceiling
    pub limit: u32,
    /// Requests left today
    pub remaining: u32,
    /// When the window resets
    pub reset_at: DateTime<Utc>,
    /// Set on denials
    pub retry_after: Option<Duration>,
}

/// Read-only view of today's usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    /// Requests counted today
    pub count: u32,
    /// Daily ceiling
    pub limit: u32,
    /// Requests left today
    pub remaining: u32,
    /// When the window resets
    pub reset_at: DateTime<Utc>,
}

/// Daily window arithmetic in a fixed UTC offset
#[derive(Debug, Clone, Copy)]
pub struct QuotaWindow {
    offset: FixedOffset,
}

impl QuotaWindow {
    /// Window resetting at midnight in `offset`
    #[must_use]
    pub const fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Calendar date key (`YYYY-MM-DD`) for `now`
    #[must_use]
    pub fn day_key(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.offset)
            .date_naive()
            .format("%Y-%m-%d")
            .to_string()
    }

    /// Next local midnight after `now`
    ///
    /// # Errors
    ///
    /// Returns an internal error if the date is out of chrono's range
    pub fn reset_at(&self, now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
        let tomorrow = now
            .with_timezone(&self.offset)
            .date_naive()
            .checked_add_days(Days::new(1))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| AppError::internal("Quota window date out of range"))?;

        self.offset
            .from_local_datetime(&tomorrow)
            .single()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| AppError::internal("Ambiguous quota reset time"))
    }

    /// Time from `now` until the window resets, at least one second
    ///
    /// # Errors
    ///
    /// Returns an internal error if the reset time cannot be computed
    pub fn retry_after(&self, now: DateTime<Utc>) -> AppResult<Duration> {
        let remaining = (self.reset_at(now)? - now)
            .to_std()
            .unwrap_or(Duration::ZERO);
        Ok(remaining.max(Duration::from_secs(1)))
    }
}

/// Per-identity daily request counter with a tier ceiling
#[async_trait]
pub trait QuotaTracker: Send + Sync {
    /// Reserve one request for `identity` if it is under `ceiling`
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` when the reservation cannot be persisted; a
    /// storage failure never grants a slot
    async fn check_and_reserve(&self, identity: &Identity, ceiling: u32)
        -> AppResult<QuotaDecision>;

    /// Today's usage without reserving
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` when the counter cannot be read
    async fn usage(&self, identity: &Identity, ceiling: u32) -> AppResult<QuotaUsage>;
}

/// SQLite-backed quota tracker
pub struct SqliteQuotaTracker {
    quota: QuotaManager,
    window: QuotaWindow,
    global_ceiling: Option<u32>,
}

impl SqliteQuotaTracker {
    /// Create a tracker over the quota table
    #[must_use]
    pub const fn new(
        quota: QuotaManager,
        utc_offset: FixedOffset,
        global_ceiling: Option<u32>,
    ) -> Self {
        Self {
            quota,
            window: QuotaWindow::new(utc_offset),
            global_ceiling,
        }
    }
}

#[async_trait]
impl QuotaTracker for SqliteQuotaTracker {
    async fn check_and_reserve(
        &self,
        identity: &Identity,
        ceiling: u32,
    ) -> AppResult<QuotaDecision> {
        let now = Utc::now();
        let day = self.window.day_key(now);
        let reset_at = self.window.reset_at(now)?;

        let outcome = self
            .quota
            .reserve(&identity.storage_key(), &day, ceiling, self.global_ceiling)
            .await?;

        let decision = match outcome {
            ReservationOutcome::Granted { count } => QuotaDecision::Allowed {
                count,
                limit: ceiling,
                remaining: ceiling.saturating_sub(count),
                reset_at,
            },
            ReservationOutcome::IdentityExhausted => QuotaDecision::Denied {
                limit: ceiling,
                retry_after: self.window.retry_after(now)?,
                reset_at,
                scope: QuotaScope::Identity,
            },
            ReservationOutcome::GlobalExhausted => QuotaDecision::Denied {
                limit: ceiling,
                retry_after: self.window.retry_after(now)?,
                reset_at,
                scope: QuotaScope::Global,
            },
        };

        let count = match decision {
            QuotaDecision::Allowed { count, .. } => count,
            QuotaDecision::Denied { .. } => ceiling,
        };
        AppLogger::log_quota_decision(identity, decision.is_allowed(), count, ceiling);

        Ok(decision)
    }

    async fn usage(&self, identity: &Identity, ceiling: u32) -> AppResult<QuotaUsage> {
        let now = Utc::now();
        let count = self
            .quota
            .count(&identity.storage_key(), &self.window.day_key(now))
            .await?;

        Ok(QuotaUsage {
            count,
            limit: ceiling,
            remaining: ceiling.saturating_sub(count),
            reset_at: self.window.reset_at(now)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_utc_window_resets_at_midnight() {
        let window = QuotaWindow::new(FixedOffset::east_opt(0).unwrap());
        let now = at("2025-03-10T22:30:00Z");

        assert_eq!(window.day_key(now), "2025-03-10");
        assert_eq!(window.reset_at(now).unwrap(), at("2025-03-11T00:00:00Z"));
        assert_eq!(
            window.retry_after(now).unwrap(),
            Duration::from_secs(90 * 60)
        );
    }

    #[test]
    fn test_offset_window_uses_local_calendar_day() {
        // UTC+9: 16:00Z is already 01:00 the next local day
        let window = QuotaWindow::new(FixedOffset::east_opt(9 * 3600).unwrap());
        let now = at("2025-03-10T16:00:00Z");

        assert_eq!(window.day_key(now), "2025-03-11");
        assert_eq!(window.reset_at(now).unwrap(), at("2025-03-11T15:00:00Z"));
    }

    #[test]
    fn test_retry_after_is_never_zero() {
        let window = QuotaWindow::new(FixedOffset::east_opt(0).unwrap());
        let now = at("2025-03-10T23:59:59.999Z");
        assert!(window.retry_after(now).unwrap() >= Duration::from_secs(1));
    }

    #[test]
    fn test_denial_converts_to_quota_error() {
        let decision = QuotaDecision::Denied {
            limit: 3,
            retry_after: Duration::from_secs(60),
            reset_at: Utc::now(),
            scope: QuotaScope::Identity,
        };
        let error = decision.into_result().unwrap_err();
        assert_eq!(error.code, ErrorCode::QuotaExceeded);
        assert_eq!(error.details["retry_after_secs"], 60);
    }
}
