//! Postgres-backed [`RecordStore`].
//!
//! Table layout (see `migrations/`, not checked in here):
//!
//! ```sql
//! CREATE TABLE classification_records (
//!     message_id              TEXT PRIMARY KEY,
//!     timestamp               TIMESTAMPTZ NOT NULL,
//!     source_queue            TEXT NOT NULL,
//!     category                TEXT NOT NULL,
//!     confidence              DOUBLE PRECISION NOT NULL,
//!     reasoning               TEXT NOT NULL,
//!     model_tag               TEXT NOT NULL,
//!     tokens_input            INTEGER NOT NULL,
//!     tokens_output           INTEGER NOT NULL,
//!     recommended_action      JSONB NOT NULL,
//!     action_taken            TEXT,
//!     outcome                 TEXT NOT NULL,
//!     retry_count             INTEGER NOT NULL,
//!     retry_scheduled_for     TIMESTAMPTZ,
//!     archive_location        TEXT,
//!     incident_key            TEXT,
//!     suspected_deployment    TEXT,
//!     similar_failures_count  INTEGER NOT NULL,
//!     semantic_hash           TEXT NOT NULL,
//!     ttl_days                INTEGER NOT NULL
//! );
//! CREATE INDEX classification_records_queue_timestamp_idx
//!     ON classification_records (source_queue, timestamp);
//! CREATE INDEX classification_records_category_timestamp_idx
//!     ON classification_records (category, timestamp);
//! CREATE INDEX classification_records_semantic_hash_idx
//!     ON classification_records (semantic_hash);
//! CREATE INDEX classification_records_deployment_timestamp_idx
//!     ON classification_records (suspected_deployment, timestamp)
//!     WHERE suspected_deployment IS NOT NULL;
//! ```
//!
//! Only `count_by_queue_since` is exercised by the pipeline today (the
//! Monitor's similar-failures query, §4.1); the category, semantic-hash and
//! deployment indexes back the by-category-by-timestamp/by-semantic-hash/
//! by-deployment-by-timestamp lookups an operator or a future audit surface
//! runs directly against the table (§6).

use chrono::{DateTime, Utc};
use dlq_core::model::{
    ActionTaken, Category, ClassificationRecord, ModelTag, Outcome, RecommendedAction, TokenUsage,
};
use dlq_core::record_store::{OutcomeUpdate, RecordStore, RecordStoreError};
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;

/// Postgres-backed classification record store.
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Create a new record store over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<ClassificationRecord, RecordStoreError> {
        let category_str: String = row.get("category");
        let category = Category::parse(&category_str).ok_or_else(|| {
            RecordStoreError::StorageError(format!("invalid category: {category_str}"))
        })?;

        let model_tag_str: String = row.get("model_tag");
        let model_tag = parse_model_tag(&model_tag_str);

        let recommended_action_json: serde_json::Value = row.get("recommended_action");
        let recommended_action: RecommendedAction =
            serde_json::from_value(recommended_action_json).map_err(|e| {
                RecordStoreError::StorageError(format!("malformed recommended_action: {e}"))
            })?;

        let action_taken: Option<String> = row.get("action_taken");
        let action_taken = action_taken
            .map(|s| parse_action_taken(&s))
            .transpose()
            .map_err(RecordStoreError::StorageError)?;

        let outcome_str: String = row.get("outcome");
        let outcome = parse_outcome(&outcome_str).map_err(RecordStoreError::StorageError)?;

        #[allow(clippy::cast_sign_loss)]
        Ok(ClassificationRecord {
            message_id: row.get("message_id"),
            timestamp: row.get("timestamp"),
            source_queue: row.get("source_queue"),
            category,
            confidence: row.get("confidence"),
            reasoning: row.get("reasoning"),
            model_tag,
            tokens: TokenUsage {
                input: row.get::<i32, _>("tokens_input") as u32,
                output: row.get::<i32, _>("tokens_output") as u32,
            },
            recommended_action,
            action_taken,
            outcome,
            retry_count: row.get::<i32, _>("retry_count") as u32,
            retry_scheduled_for: row.get("retry_scheduled_for"),
            archive_location: row.get("archive_location"),
            incident_key: row.get("incident_key"),
            suspected_deployment: row.get("suspected_deployment"),
            similar_failures_count: row.get::<i32, _>("similar_failures_count") as u32,
            semantic_hash: row.get("semantic_hash"),
            ttl_days: row.get::<i32, _>("ttl_days") as u32,
        })
    }
}

fn parse_model_tag(s: &str) -> ModelTag {
    match s {
        "heuristic" => ModelTag::Heuristic,
        "cache" => ModelTag::Cache,
        "fallback" => ModelTag::Fallback,
        model => ModelTag::Llm(model.to_string()),
    }
}

fn parse_action_taken(s: &str) -> Result<ActionTaken, String> {
    match s {
        "REPLAYED" => Ok(ActionTaken::Replayed),
        "ARCHIVED" => Ok(ActionTaken::Archived),
        "ESCALATED" => Ok(ActionTaken::Escalated),
        other => Err(format!("invalid action_taken: {other}")),
    }
}

fn parse_outcome(s: &str) -> Result<Outcome, String> {
    match s {
        "PENDING" => Ok(Outcome::Pending),
        "SUCCESS" => Ok(Outcome::Success),
        "FAILED" => Ok(Outcome::Failed),
        other => Err(format!("invalid outcome: {other}")),
    }
}

impl RecordStore for PostgresRecordStore {
    fn put(
        &self,
        record: ClassificationRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), RecordStoreError>> + Send + '_>> {
        Box::pin(async move {
            let recommended_action_json =
                serde_json::to_value(&record.recommended_action).map_err(|e| {
                    RecordStoreError::StorageError(format!("cannot serialize recommended_action: {e}"))
                })?;
            let action_taken = record.action_taken.map(ActionTaken::as_str);

            sqlx::query(
                r"
                INSERT INTO classification_records (
                    message_id, timestamp, source_queue, category, confidence,
                    reasoning, model_tag, tokens_input, tokens_output,
                    recommended_action, action_taken, outcome, retry_count,
                    retry_scheduled_for, archive_location, incident_key,
                    suspected_deployment, similar_failures_count, semantic_hash, ttl_days
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20
                )
                ON CONFLICT (message_id) DO UPDATE SET
                    timestamp = EXCLUDED.timestamp,
                    source_queue = EXCLUDED.source_queue,
                    category = EXCLUDED.category,
                    confidence = EXCLUDED.confidence,
                    reasoning = EXCLUDED.reasoning,
                    model_tag = EXCLUDED.model_tag,
                    tokens_input = EXCLUDED.tokens_input,
                    tokens_output = EXCLUDED.tokens_output,
                    recommended_action = EXCLUDED.recommended_action,
                    action_taken = EXCLUDED.action_taken,
                    outcome = EXCLUDED.outcome,
                    retry_count = EXCLUDED.retry_count,
                    retry_scheduled_for = EXCLUDED.retry_scheduled_for,
                    archive_location = EXCLUDED.archive_location,
                    incident_key = EXCLUDED.incident_key,
                    suspected_deployment = EXCLUDED.suspected_deployment,
                    similar_failures_count = EXCLUDED.similar_failures_count,
                    semantic_hash = EXCLUDED.semantic_hash,
                    ttl_days = EXCLUDED.ttl_days
                ",
            )
            .bind(&record.message_id)
            .bind(record.timestamp)
            .bind(&record.source_queue)
            .bind(record.category.as_str())
            .bind(record.confidence)
            .bind(&record.reasoning)
            .bind(record.model_tag.as_str())
            .bind(i32::try_from(record.tokens.input).unwrap_or(i32::MAX))
            .bind(i32::try_from(record.tokens.output).unwrap_or(i32::MAX))
            .bind(recommended_action_json)
            .bind(action_taken)
            .bind(record.outcome.as_str())
            .bind(i32::try_from(record.retry_count).unwrap_or(i32::MAX))
            .bind(record.retry_scheduled_for)
            .bind(&record.archive_location)
            .bind(&record.incident_key)
            .bind(&record.suspected_deployment)
            .bind(i32::try_from(record.similar_failures_count).unwrap_or(i32::MAX))
            .bind(&record.semantic_hash)
            .bind(i32::try_from(record.ttl_days).unwrap_or(i32::MAX))
            .execute(&self.pool)
            .await
            .map_err(|e| RecordStoreError::StorageError(e.to_string()))?;

            metrics::counter!("analyzer.record_store.put", "category" => record.category.as_str())
                .increment(1);

            Ok(())
        })
    }

    fn get(
        &self,
        message_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ClassificationRecord, RecordStoreError>> + Send + '_>> {
        let message_id = message_id.to_string();
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT
                    message_id, timestamp, source_queue, category, confidence,
                    reasoning, model_tag, tokens_input, tokens_output,
                    recommended_action, action_taken, outcome, retry_count,
                    retry_scheduled_for, archive_location, incident_key,
                    suspected_deployment, similar_failures_count, semantic_hash, ttl_days
                FROM classification_records
                WHERE message_id = $1
                ",
            )
            .bind(&message_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RecordStoreError::StorageError(e.to_string()))?
            .ok_or_else(|| RecordStoreError::NotFound(message_id.clone()))?;

            Self::row_to_record(&row)
        })
    }

    fn update_outcome(
        &self,
        message_id: &str,
        update: OutcomeUpdate,
    ) -> Pin<Box<dyn Future<Output = Result<(), RecordStoreError>> + Send + '_>> {
        let message_id = message_id.to_string();
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE classification_records
                SET action_taken = $1,
                    outcome = $2,
                    retry_scheduled_for = $3,
                    archive_location = $4,
                    incident_key = $5
                WHERE message_id = $6
                ",
            )
            .bind(update.action_taken.as_str())
            .bind(update.outcome.as_str())
            .bind(update.retry_scheduled_for)
            .bind(&update.archive_location)
            .bind(&update.incident_key)
            .bind(&message_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RecordStoreError::StorageError(e.to_string()))?;

            if result.rows_affected() == 0 {
                return Err(RecordStoreError::NotFound(message_id));
            }

            tracing::info!(
                message_id = %message_id,
                action_taken = update.action_taken.as_str(),
                outcome = update.outcome.as_str(),
                "classification record outcome updated"
            );

            Ok(())
        })
    }

    fn count_by_queue_since(
        &self,
        source_queue: &str,
        since: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u32, RecordStoreError>> + Send + '_>> {
        let source_queue = source_queue.to_string();
        Box::pin(async move {
            let (count,): (i64,) = sqlx::query_as(
                r"
                SELECT COUNT(*)
                FROM classification_records
                WHERE source_queue = $1 AND timestamp > $2
                ",
            )
            .bind(&source_queue)
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RecordStoreError::StorageError(e.to_string()))?;

            Ok(u32::try_from(count).unwrap_or(u32::MAX))
        })
    }
}
