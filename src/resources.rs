// ABOUTME: Centralized resource container for dependency injection into route handlers
// ABOUTME: Wires the database, quota tracker, history store, artifact store, generator, and orchestrator
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Server Resources
//!
//! Built once at startup and shared behind an `Arc` by every router.

use std::sync::Arc;

use crate::cache::memory::InMemoryResultCache;
use crate::cache::CacheConfig;
use crate::config::ServerConfig;
use crate::database::Database;
use crate::errors::AppResult;
use crate::history::{HistoryStore, SqliteHistoryStore};
use crate::imaging::{GeminiImageProvider, ImageGenerator};
use crate::rate_limiting::{QuotaTracker, SqliteQuotaTracker};
use crate::services::generation::GenerationOrchestrator;
use crate::storage::{ArtifactStore, FilesystemArtifactStore};
use crate::uploads::UploadValidator;

/// Centralized resource container for dependency injection
#[derive(Clone)]
pub struct ServerResources {
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Database handle
    pub database: Database,
    /// Daily request quota tracker
    pub quota: Arc<dyn QuotaTracker>,
    /// Reference image validator
    pub uploads: UploadValidator,
    /// Generation history
    pub history: Arc<dyn HistoryStore>,
    /// Generated image storage
    pub artifacts: Arc<dyn ArtifactStore>,
    /// External image model
    pub generator: Arc<dyn ImageGenerator>,
    /// Generation orchestrator
    pub orchestrator: Arc<GenerationOrchestrator>,
}

impl ServerResources {
    /// Build production resources: SQLite database, filesystem storage, Gemini
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the storage
    /// directories cannot be created
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        let database = Database::new(&config.database_url).await?;

        let artifacts = FilesystemArtifactStore::new(&config.storage);
        artifacts.ensure_dirs().await?;

        let generator: Arc<dyn ImageGenerator> = Arc::new(GeminiImageProvider::new(&config.gemini));

        Ok(Self::with_components(
            config,
            database,
            generator,
            Arc::new(artifacts),
        ))
    }

    /// Build resources around a supplied generator and artifact store
    ///
    /// Requires a tokio runtime for the result cache sweep task.
    #[must_use]
    pub fn with_components(
        config: ServerConfig,
        database: Database,
        generator: Arc<dyn ImageGenerator>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        let quota: Arc<dyn QuotaTracker> = Arc::new(SqliteQuotaTracker::new(
            database.quota(),
            config.quota.utc_offset,
            config.quota.global_daily_ceiling,
        ));
        let history: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::new(database.history()));
        let cache = Arc::new(InMemoryResultCache::new(&CacheConfig::from_settings(
            &config.cache,
        )));

        let orchestrator = GenerationOrchestrator::new(
            Arc::clone(&generator),
            Arc::clone(&artifacts),
            Arc::clone(&history),
            config.quota.tiers,
            config.generation,
        )
        .with_cache(cache);

        Self {
            uploads: UploadValidator::new(config.storage.max_file_size),
            config: Arc::new(config),
            database,
            quota,
            history,
            artifacts,
            generator,
            orchestrator: Arc::new(orchestrator),
        }
    }
}
