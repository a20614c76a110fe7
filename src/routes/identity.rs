// ABOUTME: Caller identity resolution from request headers and cookies
// ABOUTME: Registered users arrive via x-user-id; guests keep a session token or receive a new one
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Identity extraction
//!
//! Authentication itself happens upstream of this service. A trusted proxy
//! sets `x-user-id` for signed-in users; everyone else is a guest identified
//! by the `x-guest-session` header or the `guest_session` cookie.

use axum::response::Response;
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};
use thumbanana_core::constants::identity::{
    GUEST_SESSION_COOKIE, GUEST_SESSION_HEADER, USER_ID_HEADER,
};
use thumbanana_core::models::Identity;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Longest guest session token accepted from a client
const MAX_SESSION_LEN: usize = 128;

/// Identity of the caller plus whether a guest session was just created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// The caller
    pub identity: Identity,
    /// True when no session was presented and a fresh one was minted
    pub minted: bool,
}

impl ResolvedIdentity {
    /// Hand a freshly minted guest session back to the client
    #[must_use]
    pub fn attach_session(&self, mut response: Response) -> Response {
        if let (true, Identity::Guest { session_id }) = (self.minted, &self.identity) {
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(session_id) {
                headers.insert(GUEST_SESSION_HEADER, value);
            }
            let cookie = format!("{GUEST_SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax");
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                headers.append(SET_COOKIE, value);
            }
        }
        response
    }
}

/// Resolve the caller from request headers
///
/// # Errors
///
/// Returns `InvalidInput` when `x-user-id` is present but not a UUID
pub fn resolve_identity(headers: &HeaderMap) -> AppResult<ResolvedIdentity> {
    if let Some(raw) = headers.get(USER_ID_HEADER) {
        let user_id = raw
            .to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .ok_or_else(|| AppError::invalid_input(format!("{USER_ID_HEADER} must be a UUID")))?;
        return Ok(ResolvedIdentity {
            identity: Identity::registered(user_id),
            minted: false,
        });
    }

    let presented = headers
        .get(GUEST_SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .or_else(|| get_cookie_value(headers, GUEST_SESSION_COOKIE))
        .filter(|session| is_valid_session(session));

    Ok(presented.map_or_else(
        || ResolvedIdentity {
            identity: Identity::guest(Uuid::new_v4().simple().to_string()),
            minted: true,
        },
        |session| ResolvedIdentity {
            identity: Identity::guest(session),
            minted: false,
        },
    ))
}

fn is_valid_session(session: &str) -> bool {
    !session.is_empty()
        && session.len() <= MAX_SESSION_LEN
        && session
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Value of cookie `name` from the Cookie header
#[must_use]
pub fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use thumbanana_core::models::Tier;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_registered_user_from_header() {
        let resolved =
            resolve_identity(&headers(&[("x-user-id", "6f1c1b7e-2f7a-4a53-9d55-3e8e0b8f5a10")]))
                .unwrap();
        assert_eq!(resolved.identity.tier(), Tier::Registered);
        assert!(!resolved.minted);
    }

    #[test]
    fn test_bad_user_id_is_rejected() {
        let error = resolve_identity(&headers(&[("x-user-id", "not-a-uuid")])).unwrap_err();
        assert_eq!(error.code, ErrorCode::InvalidInput);
    }

    #[test]
    fn test_guest_from_header_then_cookie() {
        let resolved = resolve_identity(&headers(&[("x-guest-session", "abc_123")])).unwrap();
        assert_eq!(resolved.identity, Identity::guest("abc_123"));

        let resolved =
            resolve_identity(&headers(&[("cookie", "theme=dark; guest_session=s-42")])).unwrap();
        assert_eq!(resolved.identity, Identity::guest("s-42"));
        assert!(!resolved.minted);
    }

    #[test]
    fn test_mints_session_for_new_or_malformed_guest() {
        let resolved = resolve_identity(&HeaderMap::new()).unwrap();
        assert!(resolved.minted);
        assert_eq!(resolved.identity.tier(), Tier::Guest);

        let resolved = resolve_identity(&headers(&[("x-guest-session", "bad session!")])).unwrap();
        assert!(resolved.minted);
    }
}
