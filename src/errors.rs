// ABOUTME: Re-exports the unified error types from thumbanana-core
// ABOUTME: Keeps AppError and ErrorCode a single type across the workspace
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub use thumbanana_core::errors::*;
