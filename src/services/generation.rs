// ABOUTME: Generation orchestrator that fans a request out into concurrent upstream variant calls
// ABOUTME: Aggregates per-variant outcomes in request order, stores artifacts, and records history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Generation Orchestration
//!
//! One [`GenerationOrchestrator::generate`] call:
//!
//! 1. checks title, variant count and reference count against the caller's tier
//! 2. reuses a recent identical result from the cache when one exists, unless
//!    the caller asks for [`CachePolicy::Refresh`]
//! 3. otherwise spawns one task per variant, each gated by a process-wide
//!    semaphore and bounded by the upstream timeout
//! 4. retries a `Transient` upstream failure once after a backoff
//! 5. stores successful images and folds every outcome into a result ordered by
//!    variant index
//! 6. appends the result to history; a history failure becomes a warning on
//!    the outcome instead of an error
//!
//! Quota is not touched here. Callers reserve it first.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thumbanana_core::constants::generation::MAX_TITLE_CHARS;
use thumbanana_core::errors::UpstreamError;
use thumbanana_core::models::{
    ArtifactRef, GenerationRequest, GenerationResult, HistoryEntry, TierPolicies,
    VariantFailure, VariantFailureKind,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::{CacheKey, ResultCache};
use crate::config::GenerationConfig;
use crate::errors::{AppError, AppResult};
use crate::history::HistoryStore;
use crate::imaging::{GeneratedImage, ImageGenerator, ImageRequest};
use crate::logging::AppLogger;
use crate::storage::ArtifactStore;

/// What `generate` hands back to the caller
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// The result, whether or not it was persisted
    pub result: GenerationResult,
    /// The stored history entry, absent when the history write failed
    pub history_entry: Option<HistoryEntry>,
    /// Set when bookkeeping failed after the images were produced
    pub persistence_warning: Option<String>,
}

/// Whether a generation may reuse a cached result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Serve a recent identical result when one exists
    #[default]
    Reuse,
    /// Always call the provider, then refresh the cached entry
    Refresh,
}

/// Everything one variant task needs, cloned into the task
#[derive(Clone)]
struct VariantContext {
    generation_id: Uuid,
    generator: Arc<dyn ImageGenerator>,
    artifacts: Arc<dyn ArtifactStore>,
    permits: Arc<Semaphore>,
    request: ImageRequest,
    timeout: Duration,
    retry_backoff: Duration,
}

type VariantOutcome = Result<ArtifactRef, VariantFailure>;

/// Why a single upstream attempt produced no image
enum CallError {
    TimedOut,
    Upstream(UpstreamError),
}

/// Coordinates upstream calls, artifact storage, caching and history for a request
pub struct GenerationOrchestrator {
    generator: Arc<dyn ImageGenerator>,
    artifacts: Arc<dyn ArtifactStore>,
    history: Arc<dyn HistoryStore>,
    cache: Option<Arc<dyn ResultCache>>,
    policies: TierPolicies,
    permits: Arc<Semaphore>,
    settings: GenerationConfig,
}

impl GenerationOrchestrator {
    /// Create an orchestrator without a result cache
    #[must_use]
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        artifacts: Arc<dyn ArtifactStore>,
        history: Arc<dyn HistoryStore>,
        policies: TierPolicies,
        settings: GenerationConfig,
    ) -> Self {
        Self {
            generator,
            artifacts,
            history,
            cache: None,
            policies,
            permits: Arc::new(Semaphore::new(settings.max_concurrent_upstream_calls.max(1))),
            settings,
        }
    }

    /// Reuse recent identical results from `cache`
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Tier policies applied to requests
    #[must_use]
    pub const fn policies(&self) -> &TierPolicies {
        &self.policies
    }

    /// Check a request before any quota or upstream work
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a blank title and `LimitExceeded` for an
    /// over-long title, a variant count outside the tier range, or too many
    /// reference images
    pub fn validate(&self, request: &GenerationRequest) -> AppResult<()> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(AppError::invalid_input("Title must not be empty"));
        }
        let title_chars = title.chars().count();
        if title_chars > MAX_TITLE_CHARS {
            return Err(AppError::limit_exceeded(
                "title characters",
                title_chars,
                1,
                MAX_TITLE_CHARS,
            ));
        }

        let policy = self.policies.for_tier(request.identity.tier());
        policy.check_variant_count(request.variant_count)?;
        policy.check_reference_count(request.reference_images.len())
    }

    /// Generate every requested variant and record the outcome
    ///
    /// # Errors
    ///
    /// Returns a validation error before any upstream call is made. Upstream
    /// and storage failures never surface here; they are folded into the result.
    pub async fn generate(&self, request: GenerationRequest) -> AppResult<GenerationOutcome> {
        self.generate_with(request, CachePolicy::Reuse).await
    }

    /// [`Self::generate`] with an explicit cache policy
    ///
    /// # Errors
    ///
    /// Returns a validation error before any upstream call is made
    #[instrument(skip_all, fields(identity = %request.identity, variants = request.variant_count, style = %request.style, ?cache_policy))]
    pub async fn generate_with(
        &self,
        request: GenerationRequest,
        cache_policy: CachePolicy,
    ) -> AppResult<GenerationOutcome> {
        self.validate(&request)?;

        let generation_id = Uuid::new_v4();
        let created_at = Utc::now();

        let references = match self
            .artifacts
            .save_references(generation_id, &request.reference_images)
            .await
        {
            Ok(references) => references,
            Err(e) => {
                warn!(%generation_id, error = %e, "Failed to keep reference images");
                Vec::new()
            }
        };

        let cache_key = CacheKey::for_request(&request);
        let cached = match (&self.cache, cache_policy) {
            (Some(cache), CachePolicy::Reuse) => cache.get(&cache_key).await,
            _ => None,
        };

        let result = if let Some(artifacts) = cached {
            debug!(%generation_id, key = %cache_key, "Result cache hit");
            GenerationResult {
                from_cache: true,
                ..GenerationResult::from_outcomes(
                    generation_id,
                    request.summary(),
                    artifacts,
                    Vec::new(),
                    created_at,
                )
            }
        } else {
            let (artifacts, failures) = self.run_variants(generation_id, &request).await;
            let result = GenerationResult::from_outcomes(
                generation_id,
                request.summary(),
                artifacts,
                failures,
                created_at,
            );
            if let Some(cache) = &self.cache {
                if result.succeeded && result.failures.is_empty() {
                    cache.put(cache_key, result.artifacts.clone()).await;
                }
            }
            result
        };
        let result = result.with_references(references);

        AppLogger::log_generation_outcome(&request.identity, &result);

        match self.history.append(&request.identity, result.clone()).await {
            Ok(entry) => Ok(GenerationOutcome {
                result,
                history_entry: Some(entry),
                persistence_warning: None,
            }),
            Err(e) => {
                warn!(%generation_id, error = %e, "Failed to record generation history");
                Ok(GenerationOutcome {
                    result,
                    history_entry: None,
                    persistence_warning: Some(format!(
                        "The result could not be saved to history: {}",
                        e.message
                    )),
                })
            }
        }
    }

    /// Run every variant concurrently and collect outcomes keyed by index
    async fn run_variants(
        &self,
        generation_id: Uuid,
        request: &GenerationRequest,
    ) -> (Vec<ArtifactRef>, Vec<VariantFailure>) {
        let context = VariantContext {
            generation_id,
            generator: Arc::clone(&self.generator),
            artifacts: Arc::clone(&self.artifacts),
            permits: Arc::clone(&self.permits),
            request: ImageRequest::new(
                request.summarized_title(),
                request.style,
                Arc::from(request.reference_images.clone()),
            ),
            timeout: self.settings.upstream_timeout,
            retry_backoff: self.settings.transient_retry_backoff,
        };

        let mut tasks = JoinSet::new();
        for variant_index in 0..request.variant_count {
            let context = context.clone();
            tasks.spawn(async move { (variant_index, run_variant(&context, variant_index).await) });
        }

        let mut artifacts = Vec::new();
        let mut failures = Vec::new();
        let mut reported = BTreeSet::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(artifact))) => {
                    reported.insert(index);
                    artifacts.push(artifact);
                }
                Ok((index, Err(failure))) => {
                    reported.insert(index);
                    failures.push(failure);
                }
                Err(e) => warn!(%generation_id, error = %e, "Variant task did not complete"),
            }
        }

        // A task that panicked never reported its index
        failures.extend(
            (0..request.variant_count)
                .filter(|index| !reported.contains(index))
                .map(|variant_index| VariantFailure {
                    variant_index,
                    kind: VariantFailureKind::Unknown,
                    message: "Variant task aborted".to_owned(),
                }),
        );

        (artifacts, failures)
    }
}

/// One variant: upstream call with a single transient retry, then storage
async fn run_variant(context: &VariantContext, variant_index: u32) -> VariantOutcome {
    let failure = |kind: VariantFailureKind, message: String| VariantFailure {
        variant_index,
        kind,
        message,
    };

    let request = context.request.for_variant(variant_index);
    let image = match call_upstream(context, &request).await {
        Err(CallError::Upstream(e)) if e.is_retryable() => {
            debug!(
                generation_id = %context.generation_id,
                variant = variant_index,
                error = %e,
                "Retrying transient upstream failure"
            );
            time::sleep(context.retry_backoff).await;
            call_upstream(context, &request).await
        }
        other => other,
    };

    let image = match image {
        Ok(image) => image,
        Err(CallError::TimedOut) => {
            warn!(generation_id = %context.generation_id, variant = variant_index, "Upstream call timed out");
            return Err(failure(
                VariantFailureKind::Timeout,
                format!(
                    "Timed out after {}s waiting for the image provider",
                    context.timeout.as_secs()
                ),
            ));
        }
        Err(CallError::Upstream(e)) => {
            warn!(
                generation_id = %context.generation_id,
                variant = variant_index,
                kind = %e.kind,
                error = %e.message,
                "Upstream call failed"
            );
            return Err(failure(e.kind.into(), e.message));
        }
    };

    let artifact = context
        .artifacts
        .store(context.generation_id, variant_index, &image)
        .await
        .map_err(|e| failure(VariantFailureKind::Storage, e.message))?;

    info!(
        generation_id = %context.generation_id,
        variant = variant_index,
        bytes = artifact.byte_len,
        "Variant generated"
    );
    Ok(artifact)
}

/// Upstream call holding a limiter permit and bounded by the per-call timeout
///
/// The permit is released when the call returns, so a retry backoff never
/// holds a slot other requests could use.
async fn call_upstream(
    context: &VariantContext,
    request: &ImageRequest,
) -> Result<GeneratedImage, CallError> {
    let Ok(_permit) = context.permits.acquire().await else {
        return Err(CallError::Upstream(UpstreamError::unknown(
            "Upstream call limiter closed",
        )));
    };

    match time::timeout(context.timeout, context.generator.request_image(request)).await {
        Ok(Ok(image)) => Ok(image),
        Ok(Err(e)) => Err(CallError::Upstream(e)),
        Err(_) => Err(CallError::TimedOut),
    }
}
