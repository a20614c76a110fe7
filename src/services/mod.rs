// ABOUTME: Domain service layer for business logic extracted from route handlers
// ABOUTME: Hosts the generation orchestrator used by the HTTP routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Domain service layer
//!
//! Services hold the business rules so route handlers stay thin adapters.

/// Generation orchestration: validation, concurrent variant calls, aggregation
pub mod generation;
