// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides in-memory databases, temp-dir configuration, and scripted image generators
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `thumbanana_server`

use std::collections::HashMap;
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tempfile::TempDir;
use thumbanana_core::errors::UpstreamError;
use thumbanana_server::config::{DatabaseUrl, GeminiConfig, ServerConfig, StorageConfig};
use thumbanana_server::database::Database;
use thumbanana_server::imaging::{GeneratedImage, ImageGenerator, ImageRequest};
use thumbanana_server::resources::ServerResources;
use thumbanana_server::storage::{ArtifactStore, FilesystemArtifactStore};
use tokio::time;
use tracing::Level;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => Level::TRACE,
            Ok("DEBUG") => Level::DEBUG,
            Ok("INFO") => Level::INFO,
            _ => Level::WARN,
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

/// Standard in-memory test database
pub async fn create_test_database() -> Database {
    init_test_logging();
    Database::new(&DatabaseUrl::Memory)
        .await
        .expect("in-memory database")
}

/// File-backed database so concurrent reservations use separate connections
pub async fn create_file_database(dir: &TempDir) -> Database {
    init_test_logging();
    Database::new(&DatabaseUrl::SQLite {
        path: dir.path().join("quota.db"),
    })
    .await
    .expect("file database")
}

/// Configuration rooted in a temp directory with short upstream timings
pub fn test_config(dir: &TempDir) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.database_url = DatabaseUrl::Memory;
    config.gemini = GeminiConfig {
        api_key: Some("test-key".to_owned()),
        ..config.gemini
    };
    config.storage = StorageConfig {
        upload_dir: dir.path().join("uploads"),
        generated_dir: dir.path().join("generated"),
        max_file_size: config.storage.max_file_size,
    };
    config.generation.upstream_timeout = Duration::from_millis(300);
    config.generation.transient_retry_backoff = Duration::from_millis(10);
    config
}

/// Artifact store writing into the temp directory
pub fn test_artifacts(config: &ServerConfig) -> Arc<dyn ArtifactStore> {
    Arc::new(FilesystemArtifactStore::new(&config.storage))
}

/// Full resources around a scripted generator
pub async fn create_test_resources(
    dir: &TempDir,
    generator: Arc<dyn ImageGenerator>,
) -> Arc<ServerResources> {
    let config = test_config(dir);
    let database = create_test_database().await;
    let artifacts = test_artifacts(&config);
    Arc::new(ServerResources::with_components(
        config, database, generator, artifacts,
    ))
}

/// What the first call for one variant does
#[derive(Debug, Clone)]
pub enum Step {
    /// Return the variant's PNG after the delay
    Succeed(Duration),
    /// Never answer within any sensible timeout
    Hang,
    /// Fail with the given error
    Fail(UpstreamError),
}

/// Image generator scripted per variant
///
/// `steps[i]` decides the first call for variant `i`. Retries, and variants
/// beyond the script, succeed immediately. Every image carries its variant
/// index so tests can check which variant ended up where.
pub struct ScriptedGenerator {
    steps: Vec<Step>,
    calls: AtomicUsize,
    attempts: Mutex<HashMap<u32, usize>>,
    reference_counts: Mutex<Vec<usize>>,
    first_calls: Mutex<HashMap<u32, Instant>>,
    configured: bool,
}

impl ScriptedGenerator {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self::build(steps, true))
    }

    /// Always succeeds immediately
    pub fn succeeding() -> Arc<Self> {
        Self::new(Vec::new())
    }

    /// Reports itself unconfigured, as the Gemini provider does without an API key
    pub fn unconfigured() -> Arc<Self> {
        Arc::new(Self::build(Vec::new(), false))
    }

    fn build(steps: Vec<Step>, configured: bool) -> Self {
        Self {
            steps,
            calls: AtomicUsize::new(0),
            attempts: Mutex::new(HashMap::new()),
            reference_counts: Mutex::new(Vec::new()),
            first_calls: Mutex::new(HashMap::new()),
            configured,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// When the first call for `variant` reached the generator
    pub fn first_call_at(&self, variant: u32) -> Option<Instant> {
        self.first_calls.lock().unwrap().get(&variant).copied()
    }

    /// Reference images attached to each call, in call order
    pub fn reference_counts(&self) -> Vec<usize> {
        self.reference_counts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn request_image(&self, request: &ImageRequest) -> Result<GeneratedImage, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reference_counts
            .lock()
            .unwrap()
            .push(request.reference_images.len());

        let variant = request.variant_index;
        self.first_calls
            .lock()
            .unwrap()
            .entry(variant)
            .or_insert_with(Instant::now);
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let attempt = attempts.entry(variant).or_insert(0);
            *attempt += 1;
            *attempt
        };
        let step = match self.steps.get(variant as usize) {
            Some(step) if attempt == 1 => step.clone(),
            _ => Step::Succeed(Duration::ZERO),
        };

        match step {
            Step::Succeed(delay) => {
                time::sleep(delay).await;
                Ok(png_image(variant))
            }
            Step::Hang => {
                time::sleep(Duration::from_secs(3600)).await;
                Ok(png_image(variant))
            }
            Step::Fail(error) => Err(error),
        }
    }

    async fn health_check(&self) -> bool {
        self.configured
    }
}

/// Small PNG-typed payload tagged with the variant index
pub fn png_image(variant: u32) -> GeneratedImage {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(format!("variant-{variant}").as_bytes());
    GeneratedImage {
        bytes,
        mime_type: "image/png".to_owned(),
    }
}
