// ABOUTME: Reference image upload validation against size and MIME type allow-lists
// ABOUTME: Validation is pure and aggregates every rejection across a batch of files
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use thumbanana_core::constants::uploads::{ALLOWED_MIME_TYPES, MAX_FILE_SIZE_BYTES};
use thumbanana_core::models::ReferenceImage;

use crate::errors::{AppError, ErrorCode};

/// Why a single upload was refused
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UploadRejection {
    /// Declared MIME type is not an accepted image type
    #[error("{file_name}: unsupported file type '{mime_type}', allowed types are JPEG, PNG and GIF")]
    UnsupportedType {
        /// Client-supplied file name
        file_name: String,
        /// Declared MIME type
        mime_type: String,
    },
    /// File is larger than the configured maximum
    #[error("{file_name}: file is {size} bytes, exceeding the {max} byte limit")]
    TooLarge {
        /// Client-supplied file name
        file_name: String,
        /// Actual size
        size: usize,
        /// Configured maximum
        max: usize,
    },
    /// File has no content
    #[error("{file_name}: file is empty")]
    Empty {
        /// Client-supplied file name
        file_name: String,
    },
}

/// Checks reference images before they are forwarded upstream
#[derive(Debug, Clone, Copy)]
pub struct UploadValidator {
    max_file_size: usize,
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::new(MAX_FILE_SIZE_BYTES)
    }
}

impl UploadValidator {
    /// Validator with the given per-file size limit in bytes
    #[must_use]
    pub const fn new(max_file_size: usize) -> Self {
        Self { max_file_size }
    }

    /// Configured per-file size limit
    #[must_use]
    pub const fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Validate one file from its declared type and size
    ///
    /// # Errors
    ///
    /// Returns the rejection reason when the file is not acceptable
    pub fn validate(&self, file: &ReferenceImage) -> Result<(), UploadRejection> {
        if canonical_mime_type(&file.mime_type).is_none() {
            return Err(UploadRejection::UnsupportedType {
                file_name: file.file_name.clone(),
                mime_type: file.mime_type.clone(),
            });
        }
        if file.size() == 0 {
            return Err(UploadRejection::Empty {
                file_name: file.file_name.clone(),
            });
        }
        if file.size() > self.max_file_size {
            return Err(UploadRejection::TooLarge {
                file_name: file.file_name.clone(),
                size: file.size(),
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Validate every file and collect all rejections
    ///
    /// # Errors
    ///
    /// Returns `UploadRejected` listing every refused file
    pub fn validate_all(&self, files: &[ReferenceImage]) -> Result<(), AppError> {
        let rejections: Vec<UploadRejection> = files
            .iter()
            .filter_map(|file| self.validate(file).err())
            .collect();

        if rejections.is_empty() {
            return Ok(());
        }

        let message = rejections
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(AppError::new(ErrorCode::UploadRejected, message)
            .with_details(json!({ "rejections": rejections })))
    }
}

/// Normalized MIME type, or `None` when the type is not allowed
#[must_use]
pub fn canonical_mime_type(declared: &str) -> Option<&'static str> {
    let declared = declared.trim().to_ascii_lowercase();
    let declared = if declared == "image/jpg" {
        "image/jpeg"
    } else {
        declared.as_str()
    };
    ALLOWED_MIME_TYPES
        .iter()
        .copied()
        .find(|allowed| *allowed == declared)
}

/// File extension for an allowed MIME type
#[must_use]
pub fn extension_for(mime_type: &str) -> &'static str {
    match canonical_mime_type(mime_type) {
        Some("image/jpeg") => "jpg",
        Some("image/gif") => "gif",
        _ => "png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: usize = 1024 * 1024;

    #[test]
    fn test_accepts_allowed_types() {
        let validator = UploadValidator::default();
        for mime in ["image/jpeg", "image/jpg", "image/png", "IMAGE/GIF"] {
            let file = ReferenceImage::new("a", mime, vec![0; 16]);
            assert_eq!(validator.validate(&file), Ok(()), "{mime}");
        }
    }

    #[test]
    fn test_rejects_oversized_png() {
        let validator = UploadValidator::default();
        let file = ReferenceImage::new("big.png", "image/png", vec![0; 15 * MIB]);
        assert!(matches!(
            validator.validate(&file),
            Err(UploadRejection::TooLarge { size, max, .. }) if size == 15 * MIB && max == 10 * MIB
        ));
    }

    #[test]
    fn test_rejects_text_file() {
        let validator = UploadValidator::default();
        let file = ReferenceImage::new("notes.txt", "text/plain", b"hello".to_vec());
        let rejection = validator.validate(&file).unwrap_err();
        assert!(matches!(rejection, UploadRejection::UnsupportedType { .. }));
        assert!(rejection.to_string().contains("unsupported file type"));
    }

    #[test]
    fn test_rejects_empty_file() {
        let validator = UploadValidator::default();
        let file = ReferenceImage::new("empty.png", "image/png", Vec::new());
        assert!(matches!(
            validator.validate(&file),
            Err(UploadRejection::Empty { .. })
        ));
    }

    #[test]
    fn test_verdict_is_stable() {
        let validator = UploadValidator::new(8);
        let file = ReferenceImage::new("x.gif", "image/gif", vec![0; 9]);
        assert_eq!(validator.validate(&file), validator.validate(&file));
    }

    #[test]
    fn test_validate_all_reports_every_rejection() {
        let validator = UploadValidator::default();
        let files = vec![
            ReferenceImage::new("ok.png", "image/png", vec![1; 4]),
            ReferenceImage::new("big.png", "image/png", vec![0; 15 * MIB]),
            ReferenceImage::new("notes.txt", "text/plain", vec![1]),
        ];
        let error = validator.validate_all(&files).unwrap_err();
        assert_eq!(error.code, ErrorCode::UploadRejected);
        assert_eq!(error.details["rejections"].as_array().map(Vec::len), Some(2));
        assert!(error.message.contains("big.png"));
        assert!(error.message.contains("notes.txt"));
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/jpg"), "jpg");
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/gif"), "gif");
    }
}
