//! An in-memory [`dlq_core::ledger::DeduplicationLedger`] fake.

use chrono::{DateTime, Utc};
use dlq_core::ledger::{DeduplicationLedger, LedgerError};
use dlq_core::model::LedgerEntry;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

/// In-memory [`DeduplicationLedger`] fake, keyed by `(message_id, source_queue)`.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    entries: Arc<RwLock<HashMap<(String, String), LedgerEntry>>>,
}

impl InMemoryLedger {
    /// An empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

impl DeduplicationLedger for InMemoryLedger {
    fn get(
        &self,
        message_id: &str,
        source_queue: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<LedgerEntry>, LedgerError>> + Send + '_>> {
        let key = (message_id.to_string(), source_queue.to_string());
        Box::pin(async move { Ok(self.entries.read().unwrap().get(&key).cloned()) })
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
            let mut entries = self.entries.write().unwrap();
            let key = (message_id.clone(), source_queue.clone());
            let entry = entries
                .entry(key)
                .and_modify(|e| {
                    e.last_seen_at = now;
                    e.retry_count += 1;
                })
                .or_insert_with(|| LedgerEntry {
                    message_id,
                    source_queue,
                    first_seen_at: now,
                    last_seen_at: now,
                    retry_count: 0,
                });
            Ok(entry.clone())
        })
    }
}
