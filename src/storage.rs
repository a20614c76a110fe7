// ABOUTME: Artifact storage for generated thumbnails and uploaded reference images
// ABOUTME: The filesystem implementation writes under configured directories with tokio fs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thumbanana_core::models::{ArtifactRef, ReferenceImage, StoredReference};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::errors::{AppError, AppResult};
use crate::imaging::GeneratedImage;
use crate::uploads::extension_for;

/// Subdirectory of the generated directory holding provider output
const ORIGINALS_DIR: &str = "originals";

/// Where generated images and reference uploads are kept
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist one generated variant and return a reference to it
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the image cannot be written
    async fn store(
        &self,
        generation_id: Uuid,
        variant_index: u32,
        image: &GeneratedImage,
    ) -> AppResult<ArtifactRef>;

    /// Read a stored artifact back
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for unknown locations and `StorageError` on read failure
    async fn load(&self, location: &str) -> AppResult<Vec<u8>>;

    /// Keep a copy of the reference images supplied with a request
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a file cannot be written
    async fn save_references(
        &self,
        generation_id: Uuid,
        images: &[ReferenceImage],
    ) -> AppResult<Vec<StoredReference>>;

    /// Read a kept reference upload back
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for unknown locations and `StorageError` on read failure
    async fn load_reference(&self, reference: &StoredReference) -> AppResult<ReferenceImage>;
}

/// Artifact store backed by local directories
#[derive(Debug, Clone)]
pub struct FilesystemArtifactStore {
    upload_dir: PathBuf,
    generated_dir: PathBuf,
}

impl FilesystemArtifactStore {
    /// Store rooted at the configured directories
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            generated_dir: config.generated_dir.clone(),
        }
    }

    /// Create the storage directories
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a directory cannot be created
    pub async fn ensure_dirs(&self) -> AppResult<()> {
        for dir in [
            self.upload_dir.clone(),
            self.generated_dir.join(ORIGINALS_DIR),
        ] {
            fs::create_dir_all(&dir).await.map_err(|e| {
                AppError::storage(format!("Failed to create {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }

    /// Resolve a stored location under `root`, refusing anything that escapes it
    fn resolve(root: &Path, location: &str) -> AppResult<PathBuf> {
        let relative = Path::new(location);
        let safe = !location.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(AppError::not_found(format!("Artifact {location}")));
        }
        Ok(root.join(relative))
    }

    async fn read(root: &Path, location: &str) -> AppResult<Vec<u8>> {
        let path = Self::resolve(root, location)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(AppError::not_found(format!("Artifact {location}")))
            }
            Err(e) => Err(AppError::storage(format!(
                "Failed to read {}: {e}",
                path.display()
            ))),
        }
    }
}

#[async_trait]
impl ArtifactStore for FilesystemArtifactStore {
    async fn store(
        &self,
        generation_id: Uuid,
        variant_index: u32,
        image: &GeneratedImage,
    ) -> AppResult<ArtifactRef> {
        let file_name = format!(
            "{generation_id}-{variant_index}.{}",
            extension_for(&image.mime_type)
        );
        let location = format!("{ORIGINALS_DIR}/{file_name}");
        let path = self.generated_dir.join(ORIGINALS_DIR).join(&file_name);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::storage(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        fs::write(&path, &image.bytes)
            .await
            .map_err(|e| AppError::storage(format!("Failed to write {}: {e}", path.display())))?;

        debug!(%generation_id, variant = variant_index, %location, "Stored generated image");

        Ok(ArtifactRef {
            variant_index,
            location,
            mime_type: image.mime_type.clone(),
            byte_len: image.bytes.len() as u64,
        })
    }

    async fn load(&self, location: &str) -> AppResult<Vec<u8>> {
        Self::read(&self.generated_dir, location).await
    }

    async fn save_references(
        &self,
        generation_id: Uuid,
        images: &[ReferenceImage],
    ) -> AppResult<Vec<StoredReference>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }
        fs::create_dir_all(&self.upload_dir).await.map_err(|e| {
            AppError::storage(format!("Failed to create {}: {e}", self.upload_dir.display()))
        })?;

        let mut saved = Vec::with_capacity(images.len());
        for (position, image) in (0_u32..).zip(images) {
            let location = format!(
                "{generation_id}-ref{position}.{}",
                extension_for(&image.mime_type)
            );
            let path = self.upload_dir.join(&location);
            fs::write(&path, &image.data).await.map_err(|e| {
                AppError::storage(format!("Failed to write {}: {e}", path.display()))
            })?;
            saved.push(StoredReference {
                position,
                file_name: image.file_name.clone(),
                mime_type: image.mime_type.clone(),
                location,
            });
        }
        debug!(%generation_id, count = saved.len(), "Kept reference images");
        Ok(saved)
    }

    async fn load_reference(&self, reference: &StoredReference) -> AppResult<ReferenceImage> {
        let data = Self::read(&self.upload_dir, &reference.location).await?;
        Ok(ReferenceImage::new(
            reference.file_name.clone(),
            reference.mime_type.clone(),
            data,
        ))
    }
}
