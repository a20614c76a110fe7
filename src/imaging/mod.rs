// ABOUTME: Image generation provider abstraction for the external thumbnail model
// ABOUTME: Defines the request/response types and the trait the orchestrator calls per variant
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Image Generation Provider Interface
//!
//! The orchestrator issues one [`ImageGenerator::request_image`] call per
//! variant. Providers classify every failure into an [`UpstreamError`] kind so
//! the orchestrator can decide whether to retry and how to report it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use thumbanana_server::imaging::{ImageGenerator, ImageRequest};
//! use thumbanana_core::models::StylePreset;
//!
//! async fn example(generator: &dyn ImageGenerator) {
//!     let request = ImageRequest::new("My video", StylePreset::Bold, Arc::from(Vec::new()));
//!     let image = generator.request_image(&request).await;
//! }
//! ```

mod gemini;
pub mod prompts;

pub use gemini::GeminiImageProvider;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thumbanana_core::errors::UpstreamError;
use thumbanana_core::models::{ReferenceImage, StylePreset};

/// Input for one upstream image call
#[derive(Debug, Clone)]
pub struct ImageRequest {
    /// Summarized title shown in the thumbnail
    pub title: String,
    /// Style preset
    pub style: StylePreset,
    /// Reference images shared by every variant of the request
    pub reference_images: Arc<[ReferenceImage]>,
    /// Zero-based variant this call produces
    pub variant_index: u32,
}

impl ImageRequest {
    /// Create a request
    pub fn new(
        title: impl Into<String>,
        style: StylePreset,
        reference_images: Arc<[ReferenceImage]>,
    ) -> Self {
        Self {
            title: title.into(),
            style,
            reference_images,
            variant_index: 0,
        }
    }

    /// The same request addressed to another variant
    #[must_use]
    pub fn for_variant(&self, variant_index: u32) -> Self {
        Self {
            variant_index,
            ..self.clone()
        }
    }

    /// Prompt text sent upstream
    #[must_use]
    pub fn prompt(&self) -> String {
        prompts::build_prompt(&self.title, self.style, self.reference_images.len())
    }
}

/// Image bytes returned by a provider
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Encoded image
    pub bytes: Vec<u8>,
    /// MIME type reported by the provider
    pub mime_type: String,
}

impl fmt::Debug for GeneratedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedImage")
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// External image generation service
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Provider identifier for logs
    fn name(&self) -> &'static str;

    /// Whether the provider has the credentials it needs
    fn is_configured(&self) -> bool {
        true
    }

    /// Generate one image
    ///
    /// # Errors
    ///
    /// Returns an [`UpstreamError`] classified as rate limited, invalid
    /// content, transient, or unknown
    async fn request_image(&self, request: &ImageRequest) -> Result<GeneratedImage, UpstreamError>;

    /// Check connectivity with the provider
    async fn health_check(&self) -> bool;
}
