//! An in-memory [`dlq_core::record_store::RecordStore`] fake.

use chrono::{DateTime, Utc};
use dlq_core::model::ClassificationRecord;
use dlq_core::record_store::{OutcomeUpdate, RecordStore, RecordStoreError};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

/// In-memory [`RecordStore`] fake, keyed by `message_id`.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<String, ClassificationRecord>>>,
}

impl InMemoryRecordStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a record exists for `message_id`.
    #[must_use]
    pub fn contains_key(&self, message_id: &str) -> bool {
        self.records.read().unwrap().contains_key(message_id)
    }

    /// Remove every stored record.
    pub fn clear(&self) {
        self.records.write().unwrap().clear();
    }
}

impl RecordStore for InMemoryRecordStore {
    fn put(
        &self,
        record: ClassificationRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), RecordStoreError>> + Send + '_>> {
        Box::pin(async move {
            self.records
                .write()
                .unwrap()
                .insert(record.message_id.clone(), record);
            Ok(())
        })
    }

    fn get(
        &self,
        message_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ClassificationRecord, RecordStoreError>> + Send + '_>> {
        let message_id = message_id.to_string();
        Box::pin(async move {
            self.records
                .read()
                .unwrap()
                .get(&message_id)
                .cloned()
                .ok_or_else(|| RecordStoreError::NotFound(message_id.clone()))
        })
    }

    fn update_outcome(
        &self,
        message_id: &str,
        update: OutcomeUpdate,
    ) -> Pin<Box<dyn Future<Output = Result<(), RecordStoreError>> + Send + '_>> {
        let message_id = message_id.to_string();
        Box::pin(async move {
            let mut records = self.records.write().unwrap();
            let record = records
                .get_mut(&message_id)
                .ok_or_else(|| RecordStoreError::NotFound(message_id.clone()))?;
            record.action_taken = Some(update.action_taken);
            record.outcome = update.outcome;
            record.retry_scheduled_for = update.retry_scheduled_for;
            record.archive_location = update.archive_location;
            record.incident_key = update.incident_key;
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
            let count = self
                .records
                .read()
                .unwrap()
                .values()
                .filter(|r| r.source_queue == source_queue && r.timestamp > since)
                .count();
            Ok(count as u32)
        })
    }
}
