// ABOUTME: Route handlers for thumbnail generation, generation status, and image download
// ABOUTME: Validates uploads, reserves quota, then hands the request to the orchestrator on its own task
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Generation routes
//!
//! `POST /api/generate` takes a multipart form with `title`, `style_preset`,
//! `variants` and any number of `reference_images` file parts. Checks run
//! cheapest first: uploads, request shape, provider availability, quota.
//! Only then does the orchestrator run, on a spawned task so a client
//! disconnect cannot cancel work that has already consumed quota.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thumbanana_core::models::{
    ArtifactRef, GenerationRequest, GenerationResult, ReferenceImage, StylePreset,
    VariantFailure,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::{AppError, ErrorCode};
use crate::middleware::create_rate_limit_headers;
use crate::rate_limiting::RateLimitInfo;
use crate::resources::ServerResources;
use crate::routes::identity::{resolve_identity, ResolvedIdentity};
use crate::services::generation::CachePolicy;
use crate::uploads::extension_for;

/// One generated image as shown to clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ImageView {
    /// Variant index within the request
    pub variant_index: u32,
    /// Download URL
    pub url: String,
    /// MIME type of the stored image
    pub mime_type: String,
    /// Size in bytes
    pub byte_len: u64,
}

/// Quota state after a generation request
#[derive(Debug, Serialize, Deserialize)]
pub struct QuotaView {
    /// Daily ceiling
    pub limit: u32,
    /// Requests left today
    pub remaining: u32,
    /// When the daily window resets
    pub reset_at: DateTime<Utc>,
}

impl From<RateLimitInfo> for QuotaView {
    fn from(info: RateLimitInfo) -> Self {
        Self {
            limit: info.limit,
            remaining: info.remaining,
            reset_at: info.reset_at,
        }
    }
}

/// Generation result as returned by the generate and status endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationView {
    /// Generation ID
    pub id: Uuid,
    /// `completed` or `error`
    pub status: String,
    /// Title as used for the prompt
    pub title: String,
    /// Style preset
    pub style: StylePreset,
    /// Variants requested
    pub variant_count: u32,
    /// Generated images in variant order
    pub images: Vec<ImageView>,
    /// Per-kind failure summary when some variants failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Aggregated error when every variant failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failed variants
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<VariantFailure>,
    /// Whether the images were reused from a recent identical request
    pub from_cache: bool,
    /// Set when the result could not be recorded in history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence_warning: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Caller's quota after this request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<QuotaView>,
}

impl GenerationView {
    /// Project a result for clients
    #[must_use]
    pub fn from_result(result: GenerationResult) -> Self {
        let images = result
            .artifacts
            .iter()
            .map(|artifact| ImageView {
                variant_index: artifact.variant_index,
                url: download_url(result.id, artifact.variant_index),
                mime_type: artifact.mime_type.clone(),
                byte_len: artifact.byte_len,
            })
            .collect();

        Self {
            id: result.id,
            status: result.status().to_owned(),
            title: result.summary.title,
            style: result.summary.style,
            variant_count: result.summary.variant_count,
            images,
            note: result.partial_failure_note,
            error: result.error,
            failures: result.failures,
            from_cache: result.from_cache,
            persistence_warning: None,
            created_at: result.created_at,
            quota: None,
        }
    }
}

/// Download URL for one stored variant
#[must_use]
pub fn download_url(generation_id: Uuid, variant_index: u32) -> String {
    format!("/api/images/{generation_id}/{variant_index}/download")
}

/// Reserve quota for a validated request and run it to completion
///
/// Shared by fresh generations and regenerations. Provider availability is
/// checked before quota so an outage never costs the caller a request. The
/// orchestrator runs on its own task and finishes even if the client goes away.
pub(crate) async fn run_generation(
    resources: &Arc<ServerResources>,
    request: GenerationRequest,
    cache_policy: CachePolicy,
) -> Result<Response, AppError> {
    if !resources.generator.is_configured() {
        return Err(AppError::new(
            ErrorCode::ExternalServiceUnavailable,
            format!("Image provider {} is not configured", resources.generator.name()),
        ));
    }

    let tier = request.identity.tier();
    let ceiling = resources
        .orchestrator
        .policies()
        .for_tier(tier)
        .daily_request_ceiling;
    let decision = resources
        .quota
        .check_and_reserve(&request.identity, ceiling)
        .await?;
    let rate_limit = decision.rate_limit_info();
    let rate_headers = create_rate_limit_headers(&rate_limit, tier.as_str());

    if let Err(denied) = decision.into_result() {
        let mut response = denied.into_response();
        response.headers_mut().extend(rate_headers);
        return Ok(response);
    }

    let orchestrator = Arc::clone(&resources.orchestrator);
    let outcome = tokio::spawn(async move { orchestrator.generate_with(request, cache_policy).await })
        .await
        .map_err(|e| {
            error!(error = %e, "Generation task did not complete");
            AppError::internal("Generation task did not complete")
        })??;

    info!(
        generation_id = %outcome.result.id,
        status = outcome.result.status(),
        "Generation request finished"
    );

    let status = if outcome.result.succeeded {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    let mut view = GenerationView::from_result(outcome.result);
    view.persistence_warning = outcome.persistence_warning;
    view.quota = Some(QuotaView::from(rate_limit));

    let mut response = (status, Json(view)).into_response();
    response.headers_mut().extend(rate_headers);
    Ok(response)
}

/// Fields collected from the multipart form
#[derive(Default)]
struct GenerateForm {
    title: Option<String>,
    style: Option<String>,
    variants: Option<String>,
    reference_images: Vec<ReferenceImage>,
}

impl GenerateForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::invalid_input(format!("Malformed multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                "reference_images" => {
                    let file_name = field.file_name().unwrap_or("upload").to_owned();
                    let mime_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_owned();
                    let data = field.bytes().await.map_err(|e| {
                        AppError::invalid_input(format!("Failed to read {file_name}: {e}"))
                    })?;
                    // Browsers send an empty part when no file was picked
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    form.reference_images
                        .push(ReferenceImage::new(file_name, mime_type, data.to_vec()));
                }
                "title" | "style_preset" | "variants" => {
                    let text = field.text().await.map_err(|e| {
                        AppError::invalid_input(format!("Failed to read field {name}: {e}"))
                    })?;
                    match name.as_str() {
                        "title" => form.title = Some(text),
                        "style_preset" => form.style = Some(text),
                        _ => form.variants = Some(text),
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }

    fn style(&self) -> Result<StylePreset, AppError> {
        self.style
            .as_deref()
            .filter(|style| !style.trim().is_empty())
            .map_or(Ok(StylePreset::default()), str::parse)
    }

    fn variant_count(&self) -> Result<u32, AppError> {
        self.variants
            .as_deref()
            .filter(|variants| !variants.trim().is_empty())
            .map_or(Ok(1), |raw| {
                raw.trim().parse().map_err(|_| {
                    AppError::invalid_input(format!("variants must be a whole number, got '{raw}'"))
                })
            })
    }
}

/// Generation routes implementation
pub struct GenerateRoutes;

impl GenerateRoutes {
    /// Create all generation routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/generate", post(Self::handle_generate))
            .route("/api/generate/:id/status", get(Self::handle_status))
            .route(
                "/api/images/:generation_id/:variant/download",
                get(Self::handle_download),
            )
            .with_state(resources)
    }

    async fn handle_generate(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        multipart: Multipart,
    ) -> Result<Response, AppError> {
        let resolved = resolve_identity(&headers)?;
        let response = Self::generate(&resources, &resolved, multipart)
            .await
            .into_response();
        Ok(resolved.attach_session(response))
    }

    async fn generate(
        resources: &Arc<ServerResources>,
        resolved: &ResolvedIdentity,
        multipart: Multipart,
    ) -> Result<Response, AppError> {
        let form = GenerateForm::read(multipart).await?;
        let title = form
            .title
            .clone()
            .ok_or_else(|| AppError::missing_field("title"))?;

        resources.uploads.validate_all(&form.reference_images)?;

        let request = GenerationRequest {
            identity: resolved.identity.clone(),
            title,
            style: form.style()?,
            variant_count: form.variant_count()?,
            reference_images: form.reference_images,
        };
        resources.orchestrator.validate(&request)?;

        run_generation(resources, request, CachePolicy::Reuse).await
    }

    async fn handle_status(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let resolved = resolve_identity(&headers)?;
        let entry = resources
            .history
            .get_for(&resolved.identity, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Generation {id}")))?;

        let response = (
            StatusCode::OK,
            Json(GenerationView::from_result(entry.result)),
        )
            .into_response();
        Ok(resolved.attach_session(response))
    }

    async fn handle_download(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((generation_id, variant)): Path<(Uuid, u32)>,
    ) -> Result<Response, AppError> {
        let resolved = resolve_identity(&headers)?;
        let not_found = || AppError::not_found(format!("Image {generation_id}/{variant}"));

        let entry = resources
            .history
            .get_for(&resolved.identity, generation_id)
            .await?
            .ok_or_else(not_found)?;
        let artifact: &ArtifactRef = entry
            .result
            .artifacts
            .iter()
            .find(|artifact| artifact.variant_index == variant)
            .ok_or_else(not_found)?;

        let bytes = resources.artifacts.load(&artifact.location).await?;

        let content_type = HeaderValue::from_str(&artifact.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
        let disposition = HeaderValue::from_str(&format!(
            "attachment; filename=\"thumbnail-{generation_id}-{variant}.{}\"",
            extension_for(&artifact.mime_type)
        ))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

        let response = (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            bytes,
        )
            .into_response();
        Ok(resolved.attach_session(response))
    }
}
