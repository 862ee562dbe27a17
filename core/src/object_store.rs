//! Archive object storage used by the Executor's Archive handler (§4.3).

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during object store operations.
#[derive(Error, Debug, Clone)]
pub enum ObjectStoreError {
    /// The underlying storage call failed.
    #[error("object store error: {0}")]
    StorageError(String),
}

/// Metadata attached to an archived object (§4.3).
#[derive(Clone, Debug)]
pub struct ObjectMetadata {
    /// The archived message's id.
    pub message_id: String,
    /// The source queue the message came from.
    pub source_queue: String,
    /// The classification category.
    pub category: String,
    /// The classification confidence.
    pub confidence: f64,
}

/// Write-only archive storage, keyed by object key (§6: `poison-pills/…`).
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so this trait can be used
/// as `Arc<dyn ObjectStore>`.
pub trait ObjectStore: Send + Sync {
    /// Write `body` (JSON bytes) at `key` with `content_type` and
    /// `metadata`. Writes are idempotent: writing the same key twice
    /// overwrites rather than erroring (§4.3: "archive writes are
    /// overwritten idempotently").
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::StorageError`] on failure. This write
    /// must succeed before the Archive handler publishes its alert.
    fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        metadata: ObjectMetadata,
    ) -> Pin<Box<dyn Future<Output = Result<(), ObjectStoreError>> + Send + '_>>;
}

/// Build the archive key for a poison-pill message (§6):
/// `poison-pills/YYYY-MM-DD/<source_queue>/<message_id>.json`.
#[must_use]
pub fn archive_key(date: chrono::NaiveDate, source_queue: &str, message_id: &str) -> String {
    format!(
        "poison-pills/{}/{source_queue}/{message_id}.json",
        date.format("%Y-%m-%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn builds_expected_key_layout() {
        let date = NaiveDate::from_ymd_opt(2026, 7, 28).expect("valid date");
        let key = archive_key(date, "orders-dlq", "msg-123");
        assert_eq!(key, "poison-pills/2026-07-28/orders-dlq/msg-123.json");
    }
}
