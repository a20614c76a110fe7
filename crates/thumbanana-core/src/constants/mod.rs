// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Defaults for tiers, uploads, generation, history paging, and the result cache
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped by domain. Every value here is a default that the
//! environment configuration may override.

/// Result cache constants (TTL, capacity)
pub mod cache;

/// Network ports
pub mod ports {
    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 8000;
}

/// Tier ceilings applied when no overrides are configured
pub mod tiers {
    /// Daily generation requests allowed per guest session
    pub const GUEST_DAILY_REQUESTS: u32 = 3;
    /// Daily generation requests allowed per registered user
    pub const REGISTERED_DAILY_REQUESTS: u32 = 10;
    /// Daily generation requests allowed across all identities
    pub const GLOBAL_DAILY_REQUESTS: u32 = 100;
    /// Variants per request for guests
    pub const GUEST_MAX_VARIANTS: u32 = 1;
    /// Variants per request for registered users
    pub const REGISTERED_MAX_VARIANTS: u32 = 3;
    /// Reference images per request for guests
    pub const GUEST_MAX_REFERENCE_IMAGES: u32 = 1;
    /// Reference images per request for registered users
    pub const REGISTERED_MAX_REFERENCE_IMAGES: u32 = 3;
}

/// Reference image upload limits
pub mod uploads {
    /// Maximum reference image size in bytes (10 MiB)
    pub const MAX_FILE_SIZE_BYTES: usize = 10 * 1024 * 1024;
    /// Accepted MIME types
    pub const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif"];
}

/// Generation request and upstream call limits
pub mod generation {
    /// Maximum title length accepted from the client
    pub const MAX_TITLE_CHARS: usize = 2000;
    /// Title length used when building the prompt
    pub const TITLE_SUMMARY_CHARS: usize = 200;
    /// Timeout for a single upstream image call
    pub const UPSTREAM_TIMEOUT_SECS: u64 = 60;
    /// Upstream calls allowed in flight across the whole process
    pub const MAX_CONCURRENT_UPSTREAM_CALLS: usize = 4;
    /// Delay before the single retry of a transient upstream failure
    pub const TRANSIENT_RETRY_BACKOFF_MS: u64 = 500;
    /// Target thumbnail width in pixels
    pub const THUMBNAIL_WIDTH: u32 = 1280;
    /// Target thumbnail height in pixels
    pub const THUMBNAIL_HEIGHT: u32 = 720;
}

/// History listing limits
pub mod history {
    /// Page size when the client does not ask for one
    pub const DEFAULT_PAGE_SIZE: usize = 10;
    /// Largest page a client may request
    pub const MAX_PAGE_SIZE: usize = 50;
}

/// Gemini API defaults
pub mod gemini {
    /// Default image model
    pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image-preview";
    /// Default API base URL
    pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
}

/// Identity header and cookie names
pub mod identity {
    /// Header carrying the registered user's UUID, set by the upstream auth layer
    pub const USER_ID_HEADER: &str = "x-user-id";
    /// Header carrying the guest session ID
    pub const GUEST_SESSION_HEADER: &str = "x-guest-session";
    /// Cookie carrying the guest session ID
    pub const GUEST_SESSION_COOKIE: &str = "guest_session";
}
