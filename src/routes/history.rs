// ABOUTME: Route handlers for generation history, statistics, regeneration, and daily usage
// ABOUTME: Every handler scopes its reads to the calling identity
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thumbanana_core::models::{GenerationRequest, HistoryStats};
use thumbanana_core::pagination::{Cursor, PaginationParams};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::rate_limiting::QuotaUsage;
use crate::resources::ServerResources;
use crate::routes::generate::{run_generation, GenerationView};
use crate::routes::identity::resolve_identity;
use crate::services::generation::CachePolicy;

/// Query parameters for `GET /api/history`
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Opaque cursor from a previous page
    pub cursor: Option<String>,
    /// Page size, clamped to 1..=50
    pub limit: Option<usize>,
}

/// One page of history
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryPageResponse {
    /// Entries, newest first
    pub items: Vec<GenerationView>,
    /// Cursor for the next page
    pub next_cursor: Option<String>,
    /// Whether another page exists
    pub has_more: bool,
}

/// Usage response including the caller's tier
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    /// `guest` or `registered`
    pub tier: &'static str,
    /// Today's counters
    #[serde(flatten)]
    pub usage: QuotaUsage,
}

/// History routes implementation
pub struct HistoryRoutes;

impl HistoryRoutes {
    /// Create all history and usage routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/history", get(Self::handle_list))
            .route("/api/history/stats", get(Self::handle_stats))
            .route("/api/history/:id/regenerate", post(Self::handle_regenerate))
            .route("/api/usage", get(Self::handle_usage))
            .with_state(resources)
    }

    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<HistoryQuery>,
    ) -> Result<Response, AppError> {
        let resolved = resolve_identity(&headers)?;
        let pagination = PaginationParams::new(query.cursor.map(Cursor::from_string), query.limit);

        let page = resources
            .history
            .list_for(&resolved.identity, &pagination)
            .await?;

        let body = HistoryPageResponse {
            items: page
                .items
                .into_iter()
                .map(|entry| GenerationView::from_result(entry.result))
                .collect(),
            next_cursor: page.next_cursor.map(|cursor| cursor.as_str().to_owned()),
            has_more: page.has_more,
        };

        Ok(resolved.attach_session((StatusCode::OK, Json(body)).into_response()))
    }

    async fn handle_stats(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let resolved = resolve_identity(&headers)?;
        let stats: HistoryStats = resources.history.stats_for(&resolved.identity).await?;
        Ok(resolved.attach_session((StatusCode::OK, Json(stats)).into_response()))
    }

    async fn handle_usage(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let resolved = resolve_identity(&headers)?;
        let tier = resolved.identity.tier();
        let ceiling = resources
            .orchestrator
            .policies()
            .for_tier(tier)
            .daily_request_ceiling;

        let usage = resources.quota.usage(&resolved.identity, ceiling).await?;
        let body = UsageResponse {
            tier: tier.as_str(),
            usage,
        };
        Ok(resolved.attach_session((StatusCode::OK, Json(body)).into_response()))
    }

    /// Run a past generation again with its title, style, variant count and
    /// kept reference images. Always calls the provider and costs one request
    /// of today's quota.
    async fn handle_regenerate(
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

        let mut reference_images = Vec::with_capacity(entry.result.references.len());
        for reference in &entry.result.references {
            match resources.artifacts.load_reference(reference).await {
                Ok(image) => reference_images.push(image),
                Err(e) => warn!(
                    generation_id = %id,
                    location = %reference.location,
                    error = %e,
                    "Skipping reference image that can no longer be read"
                ),
            }
        }

        let summary = entry.result.summary;
        let request = GenerationRequest {
            identity: resolved.identity.clone(),
            title: summary.title,
            style: summary.style,
            variant_count: summary.variant_count,
            reference_images,
        };
        resources.orchestrator.validate(&request)?;

        let response = run_generation(&resources, request, CachePolicy::Refresh)
            .await
            .into_response();
        Ok(resolved.attach_session(response))
    }
}
