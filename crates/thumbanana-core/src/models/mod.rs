// ABOUTME: Core data models for the Thumbanana thumbnail generation service
// ABOUTME: Re-exports identity, tier, generation, and history types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Data Models
//!
//! - `Identity`, `Tier`, `TierPolicy`: who is asking and what they may ask for
//! - `GenerationRequest`, `GenerationResult`: one generation attempt and its outcome
//! - `HistoryEntry`, `HistoryStats`: what the history store persists and reports

mod generation;
mod identity;

pub use generation::{
    ArtifactRef, GenerationRequest, GenerationResult, HistoryEntry, HistoryStats,
    ReferenceImage, RequestSummary, StoredReference, StylePreset, VariantFailure,
    VariantFailureKind,
};
pub use identity::{Identity, Tier, TierPolicies, TierPolicy};
