// ABOUTME: In-memory result cache with LRU eviction and TTL support
// ABOUTME: Includes an optional background sweep for expired entries
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use thumbanana_core::models::ArtifactRef;
use tokio::sync::{mpsc, RwLock};
use tokio::time;
use tracing::debug;

use super::{CacheConfig, CacheKey, ResultCache};

type Store = Arc<RwLock<LruCache<CacheKey, CacheEntry>>>;

/// Cached artifacts with expiration
#[derive(Debug, Clone)]
struct CacheEntry {
    artifacts: Vec<ArtifactRef>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(artifacts: Vec<ArtifactRef>, ttl: Duration) -> Self {
        Self {
            artifacts,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory result cache with LRU eviction and optional background cleanup
#[derive(Clone)]
pub struct InMemoryResultCache {
    store: Store,
    ttl: Duration,
    shutdown_tx: Option<Arc<mpsc::Sender<()>>>,
}

impl InMemoryResultCache {
    const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
        Some(n) => n,
        None => unreachable!(),
    };

    /// Create a cache; spawns the sweep task when enabled (requires a tokio runtime)
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(Self::DEFAULT_CACHE_CAPACITY);
        let store: Store = Arc::new(RwLock::new(LruCache::new(capacity)));

        let shutdown_tx = config.enable_background_cleanup.then(|| {
            let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
            let store = Arc::clone(&store);
            let cleanup_interval = config.cleanup_interval;

            tokio::spawn(async move {
                let mut interval = time::interval(cleanup_interval);
                loop {
                    tokio::select! {
                        _ = interval.tick() => Self::cleanup_expired(&store).await,
                        _ = shutdown_rx.recv() => {
                            debug!("Result cache cleanup task received shutdown signal");
                            break;
                        }
                    }
                }
            });

            Arc::new(shutdown_tx)
        });

        Self {
            store,
            ttl: config.ttl,
            shutdown_tx,
        }
    }

    async fn cleanup_expired(store: &Store) {
        let mut guard = store.write().await;
        let expired: Vec<CacheKey> = guard
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            guard.pop(key);
        }
        drop(guard);

        if !expired.is_empty() {
            debug!(removed = expired.len(), "Cleaned up expired result cache entries");
        }
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn get(&self, key: &CacheKey) -> Option<Vec<ArtifactRef>> {
        let mut store = self.store.write().await;

        // LruCache::get updates recency, so it needs the write lock
        let hit = match store.get(key) {
            Some(entry) if entry.is_expired() => {
                store.pop(key);
                None
            }
            Some(entry) => Some(entry.artifacts.clone()),
            None => None,
        };
        drop(store);
        hit
    }

    async fn put(&self, key: CacheKey, artifacts: Vec<ArtifactRef>) {
        self.store
            .write()
            .await
            .push(key, CacheEntry::new(artifacts, self.ttl));
    }

    async fn len(&self) -> usize {
        let store = self.store.read().await;
        store.iter().filter(|(_, entry)| !entry.is_expired()).count()
    }
}

impl Drop for InMemoryResultCache {
    fn drop(&mut self) {
        // Only the last clone holds the final Arc; earlier drops just release a reference
        if let Some(tx) = self.shutdown_tx.take() {
            if let Ok(tx) = Arc::try_unwrap(tx) {
                if let Err(e) = tx.try_send(()) {
                    debug!(error = ?e, "Result cache shutdown signal send failed");
                }
            }
        }
    }
}
