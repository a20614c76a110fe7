// ABOUTME: Generation result cache constants for TTL and capacity
// ABOUTME: Identical requests inside the TTL reuse the previous images
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Default result cache TTL in seconds (3 minutes)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 180;

/// Default maximum cached generation results
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1000;
