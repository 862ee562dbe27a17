//! The classification record store (§3, §6).
//!
//! Backed in production by Postgres (`dlq-postgres`); the record is keyed
//! by `message_id` and carries one of the four secondary indexes needed by
//! the pipeline: by-queue-by-timestamp (used by the Monitor's
//! similar-failures-last-hour query).

use crate::model::ClassificationRecord;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during record store operations.
#[derive(Error, Debug, Clone)]
pub enum RecordStoreError {
    /// The underlying storage call failed.
    #[error("record store error: {0}")]
    StorageError(String),

    /// No record exists for the given key.
    #[error("no record for message_id {0}")]
    NotFound(String),
}

/// Persisted storage for classification records, keyed by `message_id`.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so this trait can be used
/// as `Arc<dyn RecordStore>`.
pub trait RecordStore: Send + Sync {
    /// Insert or overwrite the classification record for `record.message_id`.
    /// This must be idempotent: writing the same record twice (e.g. on
    /// Analyzer retry) is not an error (§3 invariant 1, §8 round-trip property).
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::StorageError`] if the write fails.
    fn put(
        &self,
        record: ClassificationRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), RecordStoreError>> + Send + '_>>;

    /// Fetch the classification record for `message_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::NotFound`] if no record exists, or
    /// [`RecordStoreError::StorageError`] on failure.
    fn get(
        &self,
        message_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ClassificationRecord, RecordStoreError>> + Send + '_>>;

    /// Update the `outcome`, `action_taken` and action-specific fields
    /// (`retry_scheduled_for`/`archive_location`/`incident_key`) of an
    /// existing record. Must be idempotent under retry (§4.3 Outcome
    /// write-back).
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::NotFound`] if no record exists, or
    /// [`RecordStoreError::StorageError`] on failure.
    fn update_outcome(
        &self,
        message_id: &str,
        update: OutcomeUpdate,
    ) -> Pin<Box<dyn Future<Output = Result<(), RecordStoreError>> + Send + '_>>;

    /// Count classification records for `source_queue` with `timestamp >
    /// since`, via the by-queue-by-timestamp index (§4.1 enrichment,
    /// §6 index list).
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::StorageError`] on failure. Per §4.1,
    /// callers treat a failed query as `0` and continue.
    fn count_by_queue_since(
        &self,
        source_queue: &str,
        since: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u32, RecordStoreError>> + Send + '_>>;
}

/// A partial update applied by the Executor after a handler runs (§4.3).
#[derive(Clone, Debug)]
pub struct OutcomeUpdate {
    /// The action the Executor dispatched.
    pub action_taken: crate::model::ActionTaken,
    /// The resulting outcome.
    pub outcome: crate::model::Outcome,
    /// Set when `action_taken == Replayed`.
    pub retry_scheduled_for: Option<DateTime<Utc>>,
    /// Set when `action_taken == Archived`.
    pub archive_location: Option<String>,
    /// Set when `action_taken == Escalated`.
    pub incident_key: Option<String>,
}
