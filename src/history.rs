// ABOUTME: Append-only history of generation results, readable only by the owning identity
// ABOUTME: Wraps the SQLite history tables behind a narrow store interface with cursor pagination
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # History Store
//!
//! Every read takes the caller's [`Identity`] and filters on it inside the
//! query, so the store is safe to call directly without a route-level check.

use async_trait::async_trait;
use thumbanana_core::models::{GenerationResult, HistoryEntry, HistoryStats, Identity};
use thumbanana_core::pagination::{Cursor, CursorPage, PaginationParams};
use uuid::Uuid;

use crate::database::HistoryManager;
use crate::errors::{AppError, AppResult};

/// Append-only generation history
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Record a result for `identity`
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the entry cannot be written
    async fn append(&self, identity: &Identity, result: GenerationResult) -> AppResult<HistoryEntry>;

    /// Newest-first page of `identity`'s entries
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a malformed cursor and `DatabaseError` on query failure
    async fn list_for(
        &self,
        identity: &Identity,
        pagination: &PaginationParams,
    ) -> AppResult<CursorPage<HistoryEntry>>;

    /// One entry, only if `identity` owns it
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` on query failure
    async fn get_for(&self, identity: &Identity, generation_id: Uuid) -> AppResult<Option<HistoryEntry>>;

    /// Aggregates over `identity`'s entries
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` on query failure
    async fn stats_for(&self, identity: &Identity) -> AppResult<HistoryStats>;
}

/// SQLite-backed history store
pub struct SqliteHistoryStore {
    history: HistoryManager,
}

impl SqliteHistoryStore {
    /// Create a store over the history tables
    #[must_use]
    pub const fn new(history: HistoryManager) -> Self {
        Self { history }
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, identity: &Identity, result: GenerationResult) -> AppResult<HistoryEntry> {
        self.history.insert(identity, &result).await?;
        Ok(HistoryEntry {
            identity: identity.clone(),
            result,
        })
    }

    async fn list_for(
        &self,
        identity: &Identity,
        pagination: &PaginationParams,
    ) -> AppResult<CursorPage<HistoryEntry>> {
        let position = match &pagination.cursor {
            Some(cursor) => Some(
                cursor
                    .decode()
                    .ok_or_else(|| AppError::invalid_input("Invalid pagination cursor"))?,
            ),
            None => None,
        };

        // One extra row tells us whether another page exists
        let mut results = self
            .history
            .list(
                &identity.storage_key(),
                position.as_ref(),
                pagination.limit + 1,
            )
            .await?;

        let has_more = results.len() > pagination.limit;
        results.truncate(pagination.limit);

        let next_cursor = if has_more {
            results
                .last()
                .map(|last| Cursor::new(last.created_at, &last.id.to_string()))
        } else {
            None
        };

        let items = results
            .into_iter()
            .map(|result| HistoryEntry {
                identity: identity.clone(),
                result,
            })
            .collect();

        Ok(CursorPage::new(items, next_cursor, has_more))
    }

    async fn get_for(&self, identity: &Identity, generation_id: Uuid) -> AppResult<Option<HistoryEntry>> {
        Ok(self
            .history
            .get(&identity.storage_key(), generation_id)
            .await?
            .map(|result| HistoryEntry {
                identity: identity.clone(),
                result,
            }))
    }

    async fn stats_for(&self, identity: &Identity) -> AppResult<HistoryStats> {
        self.history.stats(&identity.storage_key()).await
    }
}
