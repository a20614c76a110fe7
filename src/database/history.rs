// ABOUTME: Database operations for generation history and stored artifact references
// ABOUTME: Every read is scoped to an owner key; rows are inserted once and never updated
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Row, Sqlite, SqlitePool, Type};
use thumbanana_core::models::{
    ArtifactRef, GenerationResult, HistoryStats, Identity, RequestSummary, StoredReference,
    StylePreset, VariantFailure,
};
use thumbanana_core::pagination::CursorPosition;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

// ============================================================================
// History Manager
// ============================================================================

/// Generation history database operations
pub struct HistoryManager {
    pool: SqlitePool,
}

impl HistoryManager {
    /// Create a new history manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create history tables and indexes
    ///
    /// # Errors
    ///
    /// Returns an error if a schema statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        for statement in [
            r"
            CREATE TABLE IF NOT EXISTS generations (
                id TEXT PRIMARY KEY,
                identity_key TEXT NOT NULL,
                title TEXT NOT NULL,
                style_preset TEXT NOT NULL,
                requested_variants INTEGER NOT NULL,
                reference_count INTEGER NOT NULL,
                succeeded INTEGER NOT NULL,
                partial_failure_note TEXT,
                error_message TEXT,
                failures_json TEXT NOT NULL,
                from_cache INTEGER NOT NULL DEFAULT 0,
                created_at_millis INTEGER NOT NULL
            )
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_generations_owner_created
                ON generations (identity_key, created_at_millis DESC, id DESC)
            ",
            r"
            CREATE TABLE IF NOT EXISTS generation_artifacts (
                generation_id TEXT NOT NULL REFERENCES generations(id),
                variant_index INTEGER NOT NULL,
                location TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                byte_len INTEGER NOT NULL,
                PRIMARY KEY (generation_id, variant_index)
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS generation_references (
                generation_id TEXT NOT NULL REFERENCES generations(id),
                position INTEGER NOT NULL,
                file_name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                location TEXT NOT NULL,
                PRIMARY KEY (generation_id, position)
            )
            ",
        ] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to create history schema: {e}")))?;
        }
        Ok(())
    }

    /// Insert a generation with its artifacts and references in one transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails; nothing is written in that case
    pub async fn insert(&self, identity: &Identity, result: &GenerationResult) -> AppResult<()> {
        let failures_json = serde_json::to_string(&result.failures)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin history transaction: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO generations (
                id, identity_key, title, style_preset, requested_variants, reference_count,
                succeeded, partial_failure_note, error_message, failures_json, from_cache,
                created_at_millis
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(result.id.to_string())
        .bind(identity.storage_key())
        .bind(&result.summary.title)
        .bind(result.summary.style.as_str())
        .bind(i64::from(result.summary.variant_count))
        .bind(i64::from(result.summary.reference_count))
        .bind(result.succeeded)
        .bind(result.partial_failure_note.as_deref())
        .bind(result.error.as_deref())
        .bind(&failures_json)
        .bind(result.from_cache)
        .bind(result.created_at.timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to insert generation: {e}")))?;

        for artifact in &result.artifacts {
            sqlx::query(
                r"
                INSERT INTO generation_artifacts (generation_id, variant_index, location, mime_type, byte_len)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(result.id.to_string())
            .bind(i64::from(artifact.variant_index))
            .bind(&artifact.location)
            .bind(&artifact.mime_type)
            .bind(i64::try_from(artifact.byte_len).unwrap_or(i64::MAX))
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to insert artifact: {e}")))?;
        }

        for reference in &result.references {
            sqlx::query(
                r"
                INSERT INTO generation_references (generation_id, position, file_name, mime_type, location)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(result.id.to_string())
            .bind(i64::from(reference.position))
            .bind(&reference.file_name)
            .bind(&reference.mime_type)
            .bind(&reference.location)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to insert reference: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit generation: {e}")))?;
        Ok(())
    }

    /// Newest-first page of an owner's generations, fetching `limit` rows after `after`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored row is malformed
    pub async fn list(
        &self,
        identity_key: &str,
        after: Option<&CursorPosition>,
        limit: usize,
    ) -> AppResult<Vec<GenerationResult>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = match after {
            Some(position) => sqlx::query(
                r"
                SELECT * FROM generations
                WHERE identity_key = $1
                  AND (created_at_millis < $2 OR (created_at_millis = $2 AND id < $3))
                ORDER BY created_at_millis DESC, id DESC
                LIMIT $4
                ",
            )
            .bind(identity_key)
            .bind(position.created_at_millis)
            .bind(&position.id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query(
                r"
                SELECT * FROM generations
                WHERE identity_key = $1
                ORDER BY created_at_millis DESC, id DESC
                LIMIT $2
                ",
            )
            .bind(identity_key)
            .bind(limit)
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(|e| AppError::database(format!("Failed to list generations: {e}")))?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            results.push(self.hydrate(row).await?);
        }
        Ok(results)
    }

    /// One generation, only if owned by `identity_key`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored row is malformed
    pub async fn get(
        &self,
        identity_key: &str,
        generation_id: Uuid,
    ) -> AppResult<Option<GenerationResult>> {
        let row = sqlx::query(
            r"
            SELECT * FROM generations
            WHERE id = $1 AND identity_key = $2
            ",
        )
        .bind(generation_id.to_string())
        .bind(identity_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get generation: {e}")))?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    /// Aggregate counts over an owner's generations
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn stats(&self, identity_key: &str) -> AppResult<HistoryStats> {
        let row = sqlx::query(
            r"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(succeeded), 0) AS successful,
                (
                    SELECT COUNT(*) FROM generation_artifacts a
                    JOIN generations g ON g.id = a.generation_id
                    WHERE g.identity_key = $1
                ) AS images,
                MIN(created_at_millis) AS first_millis,
                MAX(created_at_millis) AS last_millis
            FROM generations
            WHERE identity_key = $1
            ",
        )
        .bind(identity_key)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to compute history stats: {e}")))?;

        let read = |column: &str| -> AppResult<u64> {
            row.try_get::<i64, _>(column)
                .map(|v| u64::try_from(v).unwrap_or(0))
                .map_err(|e| AppError::database(format!("Failed to read {column}: {e}")))
        };
        let timestamp = |name: &str| -> AppResult<Option<DateTime<Utc>>> {
            Ok(column::<Option<i64>>(&row, name)?.and_then(DateTime::from_timestamp_millis))
        };

        let total_generations = read("total")?;
        let successful_generations = read("successful")?;
        Ok(HistoryStats {
            total_generations,
            successful_generations,
            success_rate: HistoryStats::success_rate(successful_generations, total_generations),
            total_images: read("images")?,
            first_generation: timestamp("first_millis")?,
            last_generation: timestamp("last_millis")?,
        })
    }

    async fn artifacts_for(&self, generation_id: &str) -> AppResult<Vec<ArtifactRef>> {
        let rows = sqlx::query(
            r"
            SELECT variant_index, location, mime_type, byte_len
            FROM generation_artifacts
            WHERE generation_id = $1
            ORDER BY variant_index ASC
            ",
        )
        .bind(generation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to load artifacts: {e}")))?;

        rows.iter()
            .map(|row| {
                Ok(ArtifactRef {
                    variant_index: u32::try_from(column::<i64>(row, "variant_index")?)
                        .unwrap_or_default(),
                    location: column(row, "location")?,
                    mime_type: column(row, "mime_type")?,
                    byte_len: u64::try_from(column::<i64>(row, "byte_len")?).unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn references_for(&self, generation_id: &str) -> AppResult<Vec<StoredReference>> {
        let rows = sqlx::query(
            r"
            SELECT position, file_name, mime_type, location
            FROM generation_references
            WHERE generation_id = $1
            ORDER BY position ASC
            ",
        )
        .bind(generation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to load references: {e}")))?;

        rows.iter()
            .map(|row| {
                Ok(StoredReference {
                    position: u32::try_from(column::<i64>(row, "position")?).unwrap_or_default(),
                    file_name: column(row, "file_name")?,
                    mime_type: column(row, "mime_type")?,
                    location: column(row, "location")?,
                })
            })
            .collect()
    }

    async fn hydrate(&self, row: &SqliteRow) -> AppResult<GenerationResult> {
        let id: String = column(row, "id")?;
        let artifacts = self.artifacts_for(&id).await?;
        let references = self.references_for(&id).await?;

        let style: String = column(row, "style_preset")?;
        let failures_json: String = column(row, "failures_json")?;
        let failures: Vec<VariantFailure> = serde_json::from_str(&failures_json)?;
        let created_at_millis: i64 = column(row, "created_at_millis")?;

        Ok(GenerationResult {
            id: Uuid::parse_str(&id)
                .map_err(|e| AppError::database(format!("Invalid generation id {id}: {e}")))?,
            summary: RequestSummary {
                title: column(row, "title")?,
                style: style.parse::<StylePreset>()?,
                variant_count: u32::try_from(column::<i64>(row, "requested_variants")?)
                    .unwrap_or_default(),
                reference_count: u32::try_from(column::<i64>(row, "reference_count")?)
                    .unwrap_or_default(),
            },
            artifacts,
            succeeded: column(row, "succeeded")?,
            failures,
            partial_failure_note: column(row, "partial_failure_note")?,
            error: column(row, "error_message")?,
            from_cache: column(row, "from_cache")?,
            references,
            created_at: DateTime::from_timestamp_millis(created_at_millis).ok_or_else(|| {
                AppError::database(format!("Invalid created_at for generation {id}"))
            })?,
        })
    }
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> AppResult<T>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| AppError::database(format!("Failed to read column {name}: {e}")))
}
