//! Postgres-backed [`SemanticCache`].
//!
//! ```sql
//! CREATE TABLE semantic_cache (
//!     hash                TEXT PRIMARY KEY,
//!     category            TEXT NOT NULL,
//!     confidence          DOUBLE PRECISION NOT NULL,
//!     reasoning           TEXT NOT NULL,
//!     recommended_action  JSONB NOT NULL,
//!     cached_at           TIMESTAMPTZ NOT NULL
//! );
//! ```
//!
//! Callers are expected to apply the 1-hour TTL (`SemanticCacheEntry::TTL_HOURS`)
//! themselves by checking `cached_at`; this store returns whatever was
//! written without filtering on age.

use dlq_core::model::{Category, RecommendedAction, SemanticCacheEntry};
use dlq_core::semantic_cache::{SemanticCache, SemanticCacheError};
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;

/// Postgres-backed semantic cache.
pub struct PostgresSemanticCache {
    pool: PgPool,
}

impl PostgresSemanticCache {
    /// Create a new cache over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SemanticCache for PostgresSemanticCache {
    fn get(
        &self,
        hash: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<SemanticCacheEntry>, SemanticCacheError>> + Send + '_>>
    {
        let hash = hash.to_string();
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT category, confidence, reasoning, recommended_action, cached_at
                FROM semantic_cache
                WHERE hash = $1
                ",
            )
            .bind(&hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SemanticCacheError::StorageError(e.to_string()))?;

            let Some(row) = row else {
                return Ok(None);
            };

            let category_str: String = row.get("category");
            let category = Category::parse(&category_str).ok_or_else(|| {
                SemanticCacheError::StorageError(format!("invalid category: {category_str}"))
            })?;

            let recommended_action_json: serde_json::Value = row.get("recommended_action");
            let recommended_action: RecommendedAction = serde_json::from_value(recommended_action_json)
                .map_err(|e| SemanticCacheError::StorageError(format!("malformed recommended_action: {e}")))?;

            Ok(Some(SemanticCacheEntry {
                category,
                confidence: row.get("confidence"),
                reasoning: row.get("reasoning"),
                recommended_action,
                cached_at: row.get("cached_at"),
            }))
        })
    }

    fn put(
        &self,
        hash: &str,
        entry: SemanticCacheEntry,
    ) -> Pin<Box<dyn Future<Output = Result<(), SemanticCacheError>> + Send + '_>> {
        let hash = hash.to_string();
        Box::pin(async move {
            let recommended_action_json = serde_json::to_value(&entry.recommended_action)
                .map_err(|e| SemanticCacheError::StorageError(format!("cannot serialize recommended_action: {e}")))?;

            sqlx::query(
                r"
                INSERT INTO semantic_cache (hash, category, confidence, reasoning, recommended_action, cached_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (hash) DO UPDATE SET
                    category = EXCLUDED.category,
                    confidence = EXCLUDED.confidence,
                    reasoning = EXCLUDED.reasoning,
                    recommended_action = EXCLUDED.recommended_action,
                    cached_at = EXCLUDED.cached_at
                ",
            )
            .bind(&hash)
            .bind(entry.category.as_str())
            .bind(entry.confidence)
            .bind(&entry.reasoning)
            .bind(recommended_action_json)
            .bind(entry.cached_at)
            .execute(&self.pool)
            .await
            .map_err(|e| SemanticCacheError::StorageError(e.to_string()))?;

            Ok(())
        })
    }
}
