// ABOUTME: Google Gemini image model provider using the Generative Language REST API
// ABOUTME: Sends the prompt plus inline reference images and extracts the first returned image
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Gemini Image Provider
//!
//! Implementation of [`ImageGenerator`] for Gemini image-capable models.
//!
//! ## Configuration
//!
//! Set `GEMINI_API_KEY` with a key from Google AI Studio. `GEMINI_MODEL` and
//! `GEMINI_API_BASE_URL` override the model and endpoint.
//!
//! ## Failure classification
//!
//! | Response                                   | Kind             |
//! |--------------------------------------------|------------------|
//! | HTTP 429                                   | `RateLimited`    |
//! | HTTP 400/403, blocked prompt, no image     | `InvalidContent` |
//! | HTTP 408/5xx, connection or read failure   | `Transient`      |
//! | anything else                              | `Unknown`        |

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thumbanana_core::errors::UpstreamError;
use tracing::{debug, error, instrument, warn};

use super::{GeneratedImage, ImageGenerator, ImageRequest};
use crate::config::GeminiConfig;

/// Connect timeout for the HTTP client; the orchestrator bounds the whole call
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the health probe
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData", alias = "inline_data")]
        inline_data: InlineData,
    },
    Other(serde_json::Value),
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType", alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
    candidate_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Google Gemini image provider
pub struct GeminiImageProvider {
    api_key: Option<String>,
    client: Client,
    model: String,
    base_url: String,
}

impl Debug for GeminiImageProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GeminiImageProvider")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiImageProvider {
    /// Create a provider from configuration
    #[must_use]
    pub fn new(config: &GeminiConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client for Gemini");
                Client::new()
            });

        Self {
            api_key: config.api_key.clone(),
            client,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn build_url(&self, api_key: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{method}?key={api_key}",
            self.base_url, self.model
        )
    }

    fn build_request(request: &ImageRequest) -> GeminiRequest {
        let mut parts = vec![ContentPart::Text {
            text: request.prompt(),
        }];
        parts.extend(
            request
                .reference_images
                .iter()
                .map(|image| ContentPart::InlineData {
                    inline_data: InlineData {
                        mime_type: image.mime_type.clone(),
                        data: STANDARD.encode(&image.data),
                    },
                }),
        );

        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_owned()),
                parts,
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE", "TEXT"],
                candidate_count: 1,
            },
        }
    }

    /// Pull the first inline image out of a successful response
    fn extract_image(response: GeminiResponse) -> Result<GeneratedImage, UpstreamError> {
        if let Some(error) = response.error {
            return Err(UpstreamError::unknown(error.message));
        }
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(UpstreamError::invalid_content(format!(
                "Prompt was blocked by the provider ({reason})"
            )));
        }

        let candidates = response.candidates.unwrap_or_default();
        let finish_reason = candidates
            .first()
            .and_then(|c| c.finish_reason.clone())
            .unwrap_or_default();

        let inline = candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|content| content.parts)
            .find_map(|part| match part {
                ContentPart::InlineData { inline_data } if !inline_data.data.is_empty() => {
                    Some(inline_data)
                }
                _ => None,
            });

        let Some(inline) = inline else {
            return Err(UpstreamError::invalid_content(if finish_reason.is_empty() {
                "Provider response contained no image".to_owned()
            } else {
                format!("Provider response contained no image (finish reason {finish_reason})")
            }));
        };

        let bytes = STANDARD
            .decode(inline.data.as_bytes())
            .map_err(|e| UpstreamError::unknown(format!("Image payload was not base64: {e}")))?;

        Ok(GeneratedImage {
            bytes,
            mime_type: inline.mime_type,
        })
    }

    fn map_api_error(status: u16, response_text: &str) -> UpstreamError {
        let message = serde_json::from_str::<GeminiResponse>(response_text)
            .ok()
            .and_then(|r| r.error)
            .map_or_else(|| response_text.to_owned(), |e| e.message);

        match status {
            429 => UpstreamError::rate_limited(Self::extract_quota_message(&message)),
            400 | 403 => UpstreamError::invalid_content(format!("Gemini rejected the request: {message}")),
            408 | 500..=599 => UpstreamError::transient(format!("Gemini API error ({status}): {message}")),
            _ => UpstreamError::unknown(format!("Gemini API error ({status}): {message}")),
        }
    }

    fn extract_quota_message(message: &str) -> String {
        // Gemini embeds hints like "Please retry in 6.406453963s."
        const PREFIX: &str = "Please retry in ";
        if let Some(after_prefix) = message
            .find(PREFIX)
            .and_then(|pos| message.get(pos + PREFIX.len()..))
        {
            if let Some(seconds) = after_prefix
                .find('s')
                .and_then(|end| after_prefix.get(..end))
                .and_then(|value| value.parse::<f64>().ok())
            {
                let seconds = seconds.ceil() as u64;
                return format!("AI service quota exceeded. Please try again in {seconds} seconds.");
            }
        }
        "AI service quota exceeded. Please wait a moment and try again.".to_owned()
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self, request), fields(model = %self.model, variant = request.variant_index, style = %request.style, references = request.reference_images.len()))]
    async fn request_image(&self, request: &ImageRequest) -> Result<GeneratedImage, UpstreamError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(UpstreamError::unknown("GEMINI_API_KEY is not configured"));
        };
        let url = self.build_url(api_key, "generateContent");

        debug!("Sending image request to Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&Self::build_request(request))
            .send()
            .await
            .map_err(|e| UpstreamError::transient(format!("HTTP request failed: {}", e.without_url())))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| UpstreamError::transient(format!("Failed to read response: {}", e.without_url())))?;

        if !status.is_success() {
            error!(status = %status, "Gemini API error");
            return Err(Self::map_api_error(status.as_u16(), &response_text));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&response_text).map_err(|e| {
            error!(error = %e, "Failed to parse Gemini response");
            UpstreamError::unknown(format!("Failed to parse Gemini response: {e}"))
        })?;

        let image = Self::extract_image(gemini_response)?;
        debug!(mime_type = %image.mime_type, bytes = image.bytes.len(), "Received image from Gemini");
        Ok(image)
    }

    async fn health_check(&self) -> bool {
        let Some(api_key) = self.api_key.as_deref() else {
            return false;
        };
        let url = format!("{}/models/{}?key={api_key}", self.base_url, self.model);

        match self
            .client
            .get(&url)
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "Gemini health check failed");
                false
            }
            Err(e) => {
                warn!(error = %e.without_url(), "Gemini health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use thumbanana_core::errors::UpstreamErrorKind;
    use thumbanana_core::models::{ReferenceImage, StylePreset};

    use super::*;

    fn parse(value: &serde_json::Value) -> GeminiResponse {
        serde_json::from_value(value.clone()).unwrap()
    }

    #[test]
    fn test_request_carries_prompt_and_inline_references() {
        let request = ImageRequest::new(
            "Title",
            StylePreset::Minimal,
            Arc::from(vec![ReferenceImage::new("a.jpg", "image/jpeg", vec![1, 2, 3])]),
        );
        let body = serde_json::to_value(GeminiImageProvider::build_request(&request)).unwrap();
        let parts = &body["contents"][0]["parts"];

        assert!(parts[0]["text"].as_str().unwrap().contains("MINIMAL STYLE"));
        assert_eq!(parts[1]["inlineData"]["mimeType"], json!("image/jpeg"));
        assert_eq!(parts[1]["inlineData"]["data"], json!("AQID"));
        assert_eq!(body["generationConfig"]["responseModalities"], json!(["IMAGE", "TEXT"]));
    }

    #[test]
    fn test_extracts_first_inline_image() {
        let response = parse(&json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Here you go" },
                    { "inlineData": { "mimeType": "image/png", "data": "iVBORw==" } }
                ]},
                "finishReason": "STOP"
            }]
        }));
        let image = GeminiImageProvider::extract_image(response).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.bytes, vec![0x89, 0x50, 0x4e, 0x47]);
    }

    #[test]
    fn test_missing_or_blocked_image_is_invalid_content() {
        let text_only = parse(&json!({
            "candidates": [{ "content": { "parts": [{ "text": "no" }] }, "finishReason": "SAFETY" }]
        }));
        let error = GeminiImageProvider::extract_image(text_only).unwrap_err();
        assert_eq!(error.kind, UpstreamErrorKind::InvalidContent);
        assert!(error.message.contains("SAFETY"));

        let blocked = parse(&json!({ "promptFeedback": { "blockReason": "OTHER" } }));
        let error = GeminiImageProvider::extract_image(blocked).unwrap_err();
        assert_eq!(error.kind, UpstreamErrorKind::InvalidContent);
    }

    #[test]
    fn test_status_mapping() {
        let body = r#"{"error":{"message":"Quota hit. Please retry in 6.4s."}}"#;
        let limited = GeminiImageProvider::map_api_error(429, body);
        assert_eq!(limited.kind, UpstreamErrorKind::RateLimited);
        assert!(limited.message.contains("7 seconds"));

        assert_eq!(
            GeminiImageProvider::map_api_error(400, "bad").kind,
            UpstreamErrorKind::InvalidContent
        );
        assert_eq!(
            GeminiImageProvider::map_api_error(503, "down").kind,
            UpstreamErrorKind::Transient
        );
        assert_eq!(
            GeminiImageProvider::map_api_error(404, "nope").kind,
            UpstreamErrorKind::Unknown
        );
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let provider = GeminiImageProvider::new(&GeminiConfig {
            api_key: None,
            model: "m".to_owned(),
            base_url: "http://127.0.0.1:9".to_owned(),
        });
        assert!(!provider.is_configured());
        assert!(!provider.health_check().await);
        let request = ImageRequest::new("t", StylePreset::Bold, Arc::from(Vec::new()));
        assert_eq!(
            provider.request_image(&request).await.unwrap_err().kind,
            UpstreamErrorKind::Unknown
        );
    }
}
