// ABOUTME: Database operations for per-identity daily request counters
// ABOUTME: Reserves quota with a single conditional upsert so concurrent requests cannot overshoot
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::Utc;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::errors::{AppError, AppResult};

/// Counter key shared by every identity for the global ceiling
const GLOBAL_KEY: &str = "global";

/// Result of a reservation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// Slot taken; the identity's count after the increment
    Granted {
        /// Requests counted today including this one
        count: u32,
    },
    /// The identity's own ceiling is reached
    IdentityExhausted,
    /// The service-wide ceiling is reached
    GlobalExhausted,
}

/// Quota counter database operations
pub struct QuotaManager {
    pool: SqlitePool,
}

impl QuotaManager {
    /// Create a new quota manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the quota table
    ///
    /// # Errors
    ///
    /// Returns an error if the schema statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS quota_records (
                identity_key TEXT NOT NULL,
                quota_date TEXT NOT NULL,
                request_count INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (identity_key, quota_date)
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create quota_records table: {e}")))?;
        Ok(())
    }

    /// Atomically take one slot for `identity_key` on `quota_date`
    ///
    /// The identity row and, when configured, the global row are incremented in
    /// one transaction. If either ceiling is already reached nothing is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the reservation cannot be persisted
    pub async fn reserve(
        &self,
        identity_key: &str,
        quota_date: &str,
        ceiling: u32,
        global_ceiling: Option<u32>,
    ) -> AppResult<ReservationOutcome> {
        if ceiling == 0 {
            return Ok(ReservationOutcome::IdentityExhausted);
        }
        if global_ceiling == Some(0) {
            return Ok(ReservationOutcome::GlobalExhausted);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin quota transaction: {e}")))?;

        let Some(count) = Self::increment(&mut tx, identity_key, quota_date, ceiling).await? else {
            tx.rollback()
                .await
                .map_err(|e| AppError::database(format!("Failed to roll back quota: {e}")))?;
            return Ok(ReservationOutcome::IdentityExhausted);
        };

        if let Some(global) = global_ceiling {
            if Self::increment(&mut tx, GLOBAL_KEY, quota_date, global)
                .await?
                .is_none()
            {
                tx.rollback()
                    .await
                    .map_err(|e| AppError::database(format!("Failed to roll back quota: {e}")))?;
                return Ok(ReservationOutcome::GlobalExhausted);
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit quota reservation: {e}")))?;

        Ok(ReservationOutcome::Granted { count })
    }

    /// Conditional upsert: returns the new count, or `None` when the row is already at `ceiling`
    async fn increment(
        tx: &mut Transaction<'_, Sqlite>,
        key: &str,
        quota_date: &str,
        ceiling: u32,
    ) -> AppResult<Option<u32>> {
        let row = sqlx::query(
            r"
            INSERT INTO quota_records (identity_key, quota_date, request_count, updated_at)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (identity_key, quota_date) DO UPDATE
                SET request_count = quota_records.request_count + 1,
                    updated_at = excluded.updated_at
                WHERE quota_records.request_count < $4
            RETURNING request_count
            ",
        )
        .bind(key)
        .bind(quota_date)
        .bind(Utc::now().to_rfc3339())
        .bind(i64::from(ceiling))
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to reserve quota: {e}")))?;

        row.map(|r| {
            r.try_get::<i64, _>("request_count")
                .map(|count| u32::try_from(count).unwrap_or(u32::MAX))
                .map_err(|e| AppError::database(format!("Failed to read quota count: {e}")))
        })
        .transpose()
    }

    /// Requests counted for `identity_key` on `quota_date`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn count(&self, identity_key: &str, quota_date: &str) -> AppResult<u32> {
        let count: Option<i64> = sqlx::query_scalar(
            r"
            SELECT request_count FROM quota_records
            WHERE identity_key = $1 AND quota_date = $2
            ",
        )
        .bind(identity_key)
        .bind(quota_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to read quota: {e}")))?;

        Ok(count.map_or(0, |c| u32::try_from(c).unwrap_or(u32::MAX)))
    }
}
