// ABOUTME: Route module organization for the Thumbanana HTTP API
// ABOUTME: Merges the domain routers and applies request ID, tracing, CORS, and body limit layers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Route module for the Thumbanana server
//!
//! Each domain module holds route definitions and thin handlers that delegate
//! to the services in [`ServerResources`].

/// Thumbnail generation, status, and download routes
pub mod generate;
/// Health check and readiness routes
pub mod health;
/// History, statistics, and usage routes
pub mod history;
/// Caller identity resolution
pub mod identity;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use generate::{GenerateRoutes, GenerationView};
pub use health::HealthRoutes;
pub use history::HistoryRoutes;
pub use identity::{resolve_identity, ResolvedIdentity};

use crate::middleware::{request_id_middleware, setup_cors};
use crate::resources::ServerResources;

/// Slack on top of the reference image payload for form fields and multipart framing
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the complete application router
pub fn router(resources: Arc<ServerResources>) -> Router {
    // Room for one file more than allowed so oversized uploads reach the validator
    let max_references = resources
        .orchestrator
        .policies()
        .registered
        .max_reference_images
        .max(resources.orchestrator.policies().guest.max_reference_images) as usize;
    let body_limit = resources
        .uploads
        .max_file_size()
        .saturating_mul(max_references + 1)
        .saturating_add(FORM_OVERHEAD_BYTES);

    let cors = setup_cors(&resources.config);

    Router::new()
        .merge(HealthRoutes::routes(Arc::clone(&resources)))
        .merge(GenerateRoutes::routes(Arc::clone(&resources)))
        .merge(HistoryRoutes::routes(resources))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
}
