// ABOUTME: Core types and constants for the Thumbanana thumbnail generation service
// ABOUTME: Foundation crate with error handling, pagination, domain models, and constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Thumbanana Core
//!
//! Foundation crate providing shared types and constants for the Thumbanana
//! thumbnail generation service. This crate is designed to change infrequently,
//! enabling incremental compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError`, `ErrorCode`, and upstream errors
//! - **constants**: Application-wide constants organized by domain
//! - **pagination**: Cursor-based pagination for history listings
//! - **models**: Identities, tiers, generation requests/results, and history entries

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants and configuration defaults organized by domain
pub mod constants;

/// Cursor-based pagination for efficient data traversal
pub mod pagination;

/// Core data models (Identity, Tier, GenerationRequest, HistoryEntry, etc.)
pub mod models;
