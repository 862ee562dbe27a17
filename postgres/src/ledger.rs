//! Postgres-backed [`DeduplicationLedger`].
//!
//! ```sql
//! CREATE TABLE dedup_ledger (
//!     message_id    TEXT NOT NULL,
//!     source_queue  TEXT NOT NULL,
//!     first_seen_at TIMESTAMPTZ NOT NULL,
//!     last_seen_at  TIMESTAMPTZ NOT NULL,
//!     retry_count   INTEGER NOT NULL,
//!     PRIMARY KEY (message_id, source_queue)
//! );
//! ```

use chrono::{DateTime, Utc};
use dlq_core::ledger::{DeduplicationLedger, LedgerError};
use dlq_core::model::LedgerEntry;
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;

/// Postgres-backed deduplication ledger.
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Create a new ledger over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DeduplicationLedger for PostgresLedger {
    fn get(
        &self,
        message_id: &str,
        source_queue: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<LedgerEntry>, LedgerError>> + Send + '_>> {
        let message_id = message_id.to_string();
        let source_queue = source_queue.to_string();
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT message_id, source_queue, first_seen_at, last_seen_at, retry_count
                FROM dedup_ledger
                WHERE message_id = $1 AND source_queue = $2
                ",
            )
            .bind(&message_id)
            .bind(&source_queue)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LedgerError::StorageError(e.to_string()))?;

            Ok(row.map(|row| LedgerEntry {
                message_id: row.get("message_id"),
                source_queue: row.get("source_queue"),
                first_seen_at: row.get("first_seen_at"),
                last_seen_at: row.get("last_seen_at"),
                retry_count: row.get::<i32, _>("retry_count") as u32,
            }))
        })
    }

    fn upsert_and_increment(
        &self,
        message_id: &str,
        source_queue: &str,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<LedgerEntry, LedgerError>> + Send + '_>> {
        let message_id = message_id.to_string();
        let source_queue = source_queue.to_string();
        Box::pin(async move {
            let row = sqlx::query(
                r"
                INSERT INTO dedup_ledger (message_id, source_queue, first_seen_at, last_seen_at, retry_count)
                VALUES ($1, $2, $3, $3, 0)
                ON CONFLICT (message_id, source_queue) DO UPDATE SET
                    last_seen_at = $3,
                    retry_count = dedup_ledger.retry_count + 1
                RETURNING message_id, source_queue, first_seen_at, last_seen_at, retry_count
                ",
            )
            .bind(&message_id)
            .bind(&source_queue)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| LedgerError::StorageError(e.to_string()))?;

            let entry = LedgerEntry {
                message_id: row.get("message_id"),
                source_queue: row.get("source_queue"),
                first_seen_at: row.get("first_seen_at"),
                last_seen_at: row.get("last_seen_at"),
                retry_count: row.get::<i32, _>("retry_count") as u32,
            };

            tracing::debug!(
                message_id = %entry.message_id,
                source_queue = %entry.source_queue,
                retry_count = entry.retry_count,
                "ledger entry upserted"
            );

            Ok(entry)
        })
    }
}
