// ABOUTME: Main library entry point for the Thumbanana thumbnail generation server
// ABOUTME: Wires quota tracking, upload validation, generation orchestration, and history behind an HTTP API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Thumbanana Server
//!
//! Generates YouTube thumbnail variants from a video title, a style preset and
//! optional reference images using a Gemini image model.
//!
//! ## Architecture
//!
//! - **Quota**: per-identity daily request ceilings reserved atomically in SQLite
//! - **Uploads**: reference image type and size checks
//! - **Generation**: concurrent per-variant upstream calls with timeouts and a retry
//! - **History**: append-only, owner-restricted record of every result
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use thumbanana_server::config::ServerConfig;
//! use thumbanana_server::resources::ServerResources;
//! use thumbanana_server::routes;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ServerConfig::from_env()?;
//! let resources = Arc::new(ServerResources::new(config).await?);
//! let app = routes::router(resources);
//! # drop(app);
//! # Ok(())
//! # }
//! ```

/// Result cache for recent identical generation requests
pub mod cache;

/// Environment-driven configuration
pub mod config;

/// SQLite persistence for quota counters and history
pub mod database;

/// Unified error handling
pub mod errors;

/// Generation history store
pub mod history;

/// External image model integration and prompt building
pub mod imaging;

/// Structured logging setup
pub mod logging;

/// HTTP middleware: request IDs, CORS, quota headers
pub mod middleware;

/// Cursor pagination types
pub mod pagination;

/// Daily quota tracking
pub mod rate_limiting;

/// Shared server resources
pub mod resources;

/// HTTP routes
pub mod routes;

/// Domain services
pub mod services;

/// Artifact storage
pub mod storage;

/// Reference image validation
pub mod uploads;
