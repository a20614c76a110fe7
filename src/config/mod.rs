// ABOUTME: Configuration management module for centralized server settings and parameters
// ABOUTME: Re-exports the environment-driven server configuration types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration module for the Thumbanana server
//!
//! All configuration comes from environment variables; there is no config file.

/// Environment and server configuration
pub mod environment;

pub use environment::{
    CacheConfig, DatabaseUrl, Environment, GeminiConfig, GenerationConfig, QuotaConfig,
    ServerConfig, StorageConfig,
};
