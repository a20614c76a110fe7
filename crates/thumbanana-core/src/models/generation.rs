// ABOUTME: Generation request, result, artifact, and history entry types
// ABOUTME: Results are immutable once built and are persisted as history entries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity::Identity;
use crate::constants::generation::TITLE_SUMMARY_CHARS;
use crate::errors::{AppError, UpstreamErrorKind};

/// Visual style applied to a generated thumbnail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StylePreset {
    /// High-contrast, large text, energetic
    #[default]
    Bold,
    /// Clean layout with plenty of whitespace
    Minimal,
    /// Cartoon / comic-book look
    Comic,
    /// Modern tech aesthetic
    Tech,
}

impl StylePreset {
    /// All presets in display order
    pub const ALL: [Self; 4] = [Self::Bold, Self::Minimal, Self::Comic, Self::Tech];

    /// Wire name of the preset
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bold => "bold",
            Self::Minimal => "minimal",
            Self::Comic => "comic",
            Self::Tech => "tech",
        }
    }
}

impl fmt::Display for StylePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StylePreset {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                AppError::invalid_input(format!(
                    "Unknown style preset '{s}', expected one of bold, minimal, comic, tech"
                ))
            })
    }
}

/// Reference image uploaded alongside a generation request
#[derive(Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    /// Client-supplied file name
    pub file_name: String,
    /// Declared MIME type
    pub mime_type: String,
    /// Raw file bytes
    pub data: Vec<u8>,
}

impl ReferenceImage {
    /// Create a reference image
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Size in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Debug for ReferenceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceImage")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.data.len())
            .finish()
    }
}

/// A validated-at-the-edge request to generate thumbnail variants
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Who is asking
    pub identity: Identity,
    /// Video title, up to 2000 characters
    pub title: String,
    /// Style preset
    pub style: StylePreset,
    /// Reference images, already accepted by the upload validator
    pub reference_images: Vec<ReferenceImage>,
    /// Number of variants requested
    pub variant_count: u32,
}

impl GenerationRequest {
    /// Title truncated to the prompt summary length, on a char boundary
    #[must_use]
    pub fn summarized_title(&self) -> String {
        self.title.trim().chars().take(TITLE_SUMMARY_CHARS).collect()
    }

    /// Summary persisted with the result
    #[must_use]
    pub fn summary(&self) -> RequestSummary {
        RequestSummary {
            title: self.summarized_title(),
            style: self.style,
            variant_count: self.variant_count,
            reference_count: u32::try_from(self.reference_images.len()).unwrap_or(u32::MAX),
        }
    }
}

/// What was asked for, as stored in history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    /// Summarized title
    pub title: String,
    /// Style preset
    pub style: StylePreset,
    /// Requested variant count
    pub variant_count: u32,
    /// Number of reference images supplied
    pub reference_count: u32,
}

/// Pointer to a stored generated image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Zero-based variant index within the request
    pub variant_index: u32,
    /// Storage location understood by the artifact store
    pub location: String,
    /// MIME type of the stored image
    pub mime_type: String,
    /// Size in bytes
    pub byte_len: u64,
}

/// Reference upload kept alongside a generation so it can be regenerated later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredReference {
    /// Position among the request's reference images
    pub position: u32,
    /// Client-supplied file name
    pub file_name: String,
    /// Declared MIME type
    pub mime_type: String,
    /// Storage location understood by the artifact store
    pub location: String,
}

/// Why a single variant produced no artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantFailureKind {
    /// The call did not finish within the per-call timeout
    Timeout,
    /// Provider throttled the call
    RateLimited,
    /// Provider refused the content
    InvalidContent,
    /// Transient failure that persisted after the retry
    Transient,
    /// Unclassified provider failure
    Unknown,
    /// The image was produced but could not be stored
    Storage,
}

impl VariantFailureKind {
    /// Label used in partial-failure notes
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::InvalidContent => "invalid_content",
            Self::Transient => "transient",
            Self::Unknown => "unknown",
            Self::Storage => "storage",
        }
    }
}

impl From<UpstreamErrorKind> for VariantFailureKind {
    fn from(kind: UpstreamErrorKind) -> Self {
        match kind {
            UpstreamErrorKind::RateLimited => Self::RateLimited,
            UpstreamErrorKind::InvalidContent => Self::InvalidContent,
            UpstreamErrorKind::Transient => Self::Transient,
            UpstreamErrorKind::Unknown => Self::Unknown,
        }
    }
}

/// A variant that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantFailure {
    /// Zero-based variant index within the request
    pub variant_index: u32,
    /// Failure classification
    pub kind: VariantFailureKind,
    /// Detail message
    pub message: String,
}

/// Outcome of one generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Generation ID
    pub id: Uuid,
    /// What was asked for
    pub summary: RequestSummary,
    /// Stored artifacts ordered by variant index
    pub artifacts: Vec<ArtifactRef>,
    /// True when at least one variant produced an artifact
    pub succeeded: bool,
    /// Failed variants ordered by variant index
    pub failures: Vec<VariantFailure>,
    /// Set when some but not all variants failed
    pub partial_failure_note: Option<String>,
    /// Aggregated detail when every variant failed
    pub error: Option<String>,
    /// True when the artifacts were reused from a recent identical request
    pub from_cache: bool,
    /// Reference uploads kept for this generation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<StoredReference>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl GenerationResult {
    /// Build a result from per-variant outcomes
    ///
    /// Artifacts and failures are sorted by variant index so the result never
    /// depends on completion order.
    #[must_use]
    pub fn from_outcomes(
        id: Uuid,
        summary: RequestSummary,
        mut artifacts: Vec<ArtifactRef>,
        mut failures: Vec<VariantFailure>,
        created_at: DateTime<Utc>,
    ) -> Self {
        artifacts.sort_by_key(|artifact| artifact.variant_index);
        failures.sort_by_key(|failure| failure.variant_index);

        let succeeded = !artifacts.is_empty();
        let total = artifacts.len() + failures.len();
        let (partial_failure_note, error) = match (succeeded, failures.is_empty()) {
            (_, true) => (None, None),
            (true, false) => (Some(failure_note(&failures, total)), None),
            (false, false) => (None, Some(aggregate_error(&failures, total))),
        };

        Self {
            id,
            summary,
            artifacts,
            succeeded,
            failures,
            partial_failure_note,
            error,
            from_cache: false,
            references: Vec::new(),
            created_at,
        }
    }

    /// Attach the stored reference uploads
    #[must_use]
    pub fn with_references(mut self, mut references: Vec<StoredReference>) -> Self {
        references.sort_by_key(|reference| reference.position);
        self.references = references;
        self
    }

    /// Lifecycle status shown to clients
    #[must_use]
    pub const fn status(&self) -> &'static str {
        if self.succeeded {
            "completed"
        } else {
            "error"
        }
    }
}

fn failure_counts(failures: &[VariantFailure]) -> String {
    let mut counts: BTreeMap<VariantFailureKind, usize> = BTreeMap::new();
    for failure in failures {
        *counts.entry(failure.kind).or_default() += 1;
    }
    counts
        .iter()
        .map(|(kind, count)| format!("{count} {}", kind.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn failure_note(failures: &[VariantFailure], total: usize) -> String {
    format!(
        "{} of {total} variants failed ({})",
        failures.len(),
        failure_counts(failures)
    )
}

fn aggregate_error(failures: &[VariantFailure], total: usize) -> String {
    let details = failures
        .iter()
        .map(|failure| format!("variant {}: {}", failure.variant_index, failure.message))
        .collect::<Vec<_>>()
        .join("; ");
    format!(
        "All {total} variants failed ({}): {details}",
        failure_counts(failures)
    )
}

/// Persisted projection of a generation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Owner of the entry
    pub identity: Identity,
    /// The stored result
    #[serde(flatten)]
    pub result: GenerationResult,
}

impl HistoryEntry {
    /// Generation ID
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.result.id
    }

    /// When the entry was recorded
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.result.created_at
    }
}

/// Aggregates over an identity's history
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Generation attempts recorded
    pub total_generations: u64,
    /// Attempts that produced at least one image
    pub successful_generations: u64,
    /// Successful share of attempts in percent, one decimal place
    pub success_rate: f64,
    /// Images produced across all attempts
    pub total_images: u64,
    /// Oldest recorded attempt
    pub first_generation: Option<DateTime<Utc>>,
    /// Newest recorded attempt
    pub last_generation: Option<DateTime<Utc>>,
}

impl HistoryStats {
    /// Percentage of successful attempts rounded to one decimal, 0 with no attempts
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(successful: u64, total: u64) -> f64 {
        if total == 0 {
            return 0.0;
        }
        (successful as f64 / total as f64 * 1000.0).round() / 10.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(variants: u32) -> RequestSummary {
        RequestSummary {
            title: "Title".to_owned(),
            style: StylePreset::Bold,
            variant_count: variants,
            reference_count: 0,
        }
    }

    fn artifact(index: u32) -> ArtifactRef {
        ArtifactRef {
            variant_index: index,
            location: format!("gen-{index}.png"),
            mime_type: "image/png".to_owned(),
            byte_len: 10,
        }
    }

    fn failure(index: u32, kind: VariantFailureKind) -> VariantFailure {
        VariantFailure {
            variant_index: index,
            kind,
            message: "boom".to_owned(),
        }
    }

    #[test]
    fn test_style_preset_parsing() {
        assert_eq!("comic".parse::<StylePreset>().unwrap(), StylePreset::Comic);
        assert_eq!(" TECH ".parse::<StylePreset>().unwrap(), StylePreset::Tech);
        assert!("retro".parse::<StylePreset>().is_err());
    }

    #[test]
    fn test_partial_failure_note() {
        let result = GenerationResult::from_outcomes(
            Uuid::new_v4(),
            summary(3),
            vec![artifact(2), artifact(0)],
            vec![failure(1, VariantFailureKind::Timeout)],
            Utc::now(),
        );

        assert!(result.succeeded);
        assert_eq!(result.artifacts[0].variant_index, 0);
        assert_eq!(result.artifacts[1].variant_index, 2);
        assert_eq!(
            result.partial_failure_note.as_deref(),
            Some("1 of 3 variants failed (1 timeout)")
        );
        assert!(result.error.is_none());
    }

    #[test]
    fn test_total_failure_has_error_detail() {
        let result = GenerationResult::from_outcomes(
            Uuid::new_v4(),
            summary(2),
            Vec::new(),
            vec![
                failure(1, VariantFailureKind::RateLimited),
                failure(0, VariantFailureKind::Timeout),
            ],
            Utc::now(),
        );

        assert!(!result.succeeded);
        assert!(result.partial_failure_note.is_none());
        let error = result.error.as_deref().unwrap();
        assert!(error.starts_with("All 2 variants failed (1 timeout, 1 rate_limited)"));
        assert_eq!(result.status(), "error");
    }

    #[test]
    fn test_success_rate_rounding() {
        assert!(HistoryStats::success_rate(0, 0).abs() < f64::EPSILON);
        assert!((HistoryStats::success_rate(2, 3) - 66.7).abs() < f64::EPSILON);
        assert!((HistoryStats::success_rate(4, 4) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_references_are_kept_in_upload_order() {
        let reference = |position: u32| StoredReference {
            position,
            file_name: format!("ref-{position}.png"),
            mime_type: "image/png".to_owned(),
            location: format!("gen-ref{position}.png"),
        };
        let result = GenerationResult::from_outcomes(
            Uuid::new_v4(),
            summary(1),
            vec![artifact(0)],
            Vec::new(),
            Utc::now(),
        )
        .with_references(vec![reference(1), reference(0)]);

        let positions: Vec<u32> = result.references.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[test]
    fn test_summarized_title_respects_char_boundaries() {
        let request = GenerationRequest {
            identity: Identity::guest("s"),
            title: "가".repeat(300),
            style: StylePreset::Minimal,
            reference_images: Vec::new(),
            variant_count: 1,
        };
        assert_eq!(request.summarized_title().chars().count(), TITLE_SUMMARY_CHARS);
    }
}
