// ABOUTME: Caller identity and tier policy types
// ABOUTME: Guests and registered users map to distinct quota and variant ceilings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::tiers;
use crate::errors::{AppError, AppResult, ErrorCode};

const GUEST_KEY_PREFIX: &str = "guest:";
const USER_KEY_PREFIX: &str = "user:";

/// The party making a generation request
///
/// Every quota reservation and history entry belongs to exactly one identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    /// Anonymous visitor tracked by a session ID
    Guest {
        /// Opaque session identifier
        session_id: String,
    },
    /// Signed-in account
    Registered {
        /// Account ID issued by the auth layer
        user_id: Uuid,
    },
}

impl Identity {
    /// Guest identity for the given session
    pub fn guest(session_id: impl Into<String>) -> Self {
        Self::Guest {
            session_id: session_id.into(),
        }
    }

    /// Registered identity for the given account
    #[must_use]
    pub const fn registered(user_id: Uuid) -> Self {
        Self::Registered { user_id }
    }

    /// Tier this identity belongs to
    #[must_use]
    pub const fn tier(&self) -> Tier {
        match self {
            Self::Guest { .. } => Tier::Guest,
            Self::Registered { .. } => Tier::Registered,
        }
    }

    /// Key under which quota and history rows are stored
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::Guest { session_id } => format!("{GUEST_KEY_PREFIX}{session_id}"),
            Self::Registered { user_id } => format!("{USER_KEY_PREFIX}{user_id}"),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// Account tier determining request ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Anonymous visitor
    Guest,
    /// Signed-in account
    Registered,
}

impl Tier {
    /// Lowercase name for logs and responses
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Registered => "registered",
        }
    }
}

/// Ceilings applied to one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    /// Generation requests accepted per day
    pub daily_request_ceiling: u32,
    /// Variants allowed in one request
    pub max_variants: u32,
    /// Reference images allowed in one request
    pub max_reference_images: u32,
}

impl TierPolicy {
    /// Default guest ceilings
    #[must_use]
    pub const fn guest_default() -> Self {
        Self {
            daily_request_ceiling: tiers::GUEST_DAILY_REQUESTS,
            max_variants: tiers::GUEST_MAX_VARIANTS,
            max_reference_images: tiers::GUEST_MAX_REFERENCE_IMAGES,
        }
    }

    /// Default registered-user ceilings
    #[must_use]
    pub const fn registered_default() -> Self {
        Self {
            daily_request_ceiling: tiers::REGISTERED_DAILY_REQUESTS,
            max_variants: tiers::REGISTERED_MAX_VARIANTS,
            max_reference_images: tiers::REGISTERED_MAX_REFERENCE_IMAGES,
        }
    }

    /// Check a requested variant count against `[1, max_variants]`
    ///
    /// # Errors
    ///
    /// Returns `LimitExceeded` when the count is outside the range
    pub fn check_variant_count(&self, requested: u32) -> AppResult<()> {
        if requested == 0 || requested > self.max_variants {
            return Err(AppError::limit_exceeded(
                "variants",
                requested as usize,
                1,
                self.max_variants as usize,
            ));
        }
        Ok(())
    }

    /// Check a reference image count against `max_reference_images`
    ///
    /// # Errors
    ///
    /// Returns `LimitExceeded` when too many references are attached
    pub fn check_reference_count(&self, attached: usize) -> AppResult<()> {
        if attached > self.max_reference_images as usize {
            return Err(AppError::limit_exceeded(
                "reference_images",
                attached,
                0,
                self.max_reference_images as usize,
            ));
        }
        Ok(())
    }
}

/// Policies for both tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicies {
    /// Guest ceilings
    pub guest: TierPolicy,
    /// Registered-user ceilings
    pub registered: TierPolicy,
}

impl TierPolicies {
    /// Policy for a tier
    #[must_use]
    pub const fn for_tier(&self, tier: Tier) -> &TierPolicy {
        match tier {
            Tier::Guest => &self.guest,
            Tier::Registered => &self.registered,
        }
    }

    /// Ensure registered users always get strictly more requests than guests
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` when the ordering is violated
    pub fn validate(&self) -> AppResult<()> {
        if self.guest.daily_request_ceiling >= self.registered.daily_request_ceiling {
            return Err(AppError::new(
                ErrorCode::ConfigInvalid,
                format!(
                    "Guest daily ceiling ({}) must be lower than registered daily ceiling ({})",
                    self.guest.daily_request_ceiling, self.registered.daily_request_ceiling
                ),
            ));
        }
        if self.guest.max_variants == 0 || self.registered.max_variants == 0 {
            return Err(AppError::new(
                ErrorCode::ConfigInvalid,
                "Max variants must be at least 1 for every tier",
            ));
        }
        Ok(())
    }
}

impl Default for TierPolicies {
    fn default() -> Self {
        Self {
            guest: TierPolicy::guest_default(),
            registered: TierPolicy::registered_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keys_are_distinct_per_tier() {
        let id = Uuid::new_v4();
        assert_eq!(Identity::registered(id).storage_key(), format!("user:{id}"));
        assert_eq!(Identity::guest("abc").storage_key(), "guest:abc");
        assert_ne!(
            Identity::guest(id.to_string()).storage_key(),
            Identity::registered(id).storage_key()
        );
    }

    #[test]
    fn test_variant_count_bounds() {
        let policy = TierPolicy::registered_default();
        assert!(policy.check_variant_count(1).is_ok());
        assert!(policy.check_variant_count(3).is_ok());
        assert_eq!(
            policy.check_variant_count(0).unwrap_err().code,
            ErrorCode::LimitExceeded
        );
        assert_eq!(
            policy.check_variant_count(4).unwrap_err().code,
            ErrorCode::LimitExceeded
        );
        assert!(TierPolicy::guest_default().check_reference_count(0).is_ok());
    }

    #[test]
    fn test_default_policies_are_ordered() {
        assert!(TierPolicies::default().validate().is_ok());

        let inverted = TierPolicies {
            guest: TierPolicy::registered_default(),
            registered: TierPolicy::guest_default(),
        };
        assert!(inverted.validate().is_err());
    }
}
