// ABOUTME: Generation result cache so identical requests inside the TTL reuse stored images
// ABOUTME: Keys are SHA-256 digests over the summarized title, style, variants, and reference bytes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// In-memory cache implementation
pub mod memory;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thumbanana_core::constants::cache::{DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECS};
use thumbanana_core::models::{ArtifactRef, GenerationRequest};

use crate::config::CacheConfig as CacheSettings;

/// Cache of recent successful generations
///
/// Only fully successful results are cached; a hit hands back the artifact
/// references of the earlier generation.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Look up artifacts for `key`, dropping the entry if it has expired
    async fn get(&self, key: &CacheKey) -> Option<Vec<ArtifactRef>>;

    /// Store artifacts under `key` with the configured TTL
    async fn put(&self, key: CacheKey, artifacts: Vec<ArtifactRef>);

    /// Number of live entries
    async fn len(&self) -> usize;
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries before LRU eviction
    pub max_entries: usize,
    /// Time-to-live of every entry
    pub ttl: Duration,
    /// Interval for the background sweep of expired entries
    pub cleanup_interval: Duration,
    /// Whether to spawn the background sweep task
    pub enable_background_cleanup: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cleanup_interval: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            enable_background_cleanup: true,
        }
    }
}

impl CacheConfig {
    /// Cache configuration from server settings, sweeping once per TTL
    #[must_use]
    pub const fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            max_entries: settings.max_entries,
            ttl: settings.ttl,
            cleanup_interval: settings.ttl,
            enable_background_cleanup: true,
        }
    }
}

/// Content-addressed key for a generation request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key from everything that influences the generated images
    #[must_use]
    pub fn for_request(request: &GenerationRequest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(request.summarized_title().as_bytes());
        hasher.update(b"|");
        hasher.update(request.style.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(request.variant_count.to_le_bytes());
        for image in &request.reference_images {
            hasher.update(b"|");
            hasher.update(Sha256::digest(&image.data));
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Hex digest
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thumbanana_core::models::{Identity, ReferenceImage, StylePreset};

    fn request(title: &str, refs: Vec<ReferenceImage>) -> GenerationRequest {
        GenerationRequest {
            identity: Identity::guest("a"),
            title: title.to_owned(),
            style: StylePreset::Bold,
            reference_images: refs,
            variant_count: 1,
        }
    }

    #[test]
    fn test_key_ignores_identity_but_not_content() {
        let a = request("Title", Vec::new());
        let mut b = a.clone();
        b.identity = Identity::guest("b");
        assert_eq!(CacheKey::for_request(&a), CacheKey::for_request(&b));

        let with_ref = request(
            "Title",
            vec![ReferenceImage::new("a.png", "image/png", vec![1, 2, 3])],
        );
        assert_ne!(CacheKey::for_request(&a), CacheKey::for_request(&with_ref));

        let mut other_style = a.clone();
        other_style.style = StylePreset::Comic;
        assert_ne!(CacheKey::for_request(&a), CacheKey::for_request(&other_style));
    }
}
