//! Deduplication/retry ledger (§3, §4.1).
//!
//! One entry per `(message_id, source_queue)`. Mutated only by the
//! Monitor. The Monitor's fail-open policy (§9) applies here and only
//! here: if the ledger is unreachable, the Monitor treats the message as
//! `absent` with `retry_count = 0` rather than dropping it, favoring
//! duplicate work over data loss.

use crate::model::LedgerEntry;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    /// The underlying storage call failed.
    #[error("ledger error: {0}")]
    StorageError(String),
}

/// The deduplication ledger contract.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so this trait can be used
/// as `Arc<dyn DeduplicationLedger>`.
pub trait DeduplicationLedger: Send + Sync {
    /// Fetch the current entry for `(message_id, source_queue)`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::StorageError`] if the read fails. Per §4.1,
    /// the Monitor treats a failed read the same as a miss (fail-open).
    fn get(
        &self,
        message_id: &str,
        source_queue: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<LedgerEntry>, LedgerError>> + Send + '_>>;

    /// Atomically insert a fresh entry (`retry_count = 0`) if one does not
    /// already exist, or increment the existing entry's `retry_count` and
    /// bump `last_seen_at`. Returns the entry's state *after* the write,
    /// so callers can read back the (possibly just-incremented)
    /// `retry_count` without a second round trip.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::StorageError`] if the write fails.
    fn upsert_and_increment(
        &self,
        message_id: &str,
        source_queue: &str,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<LedgerEntry, LedgerError>> + Send + '_>>;
}
