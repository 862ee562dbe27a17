//! An in-memory [`dlq_core::object_store::ObjectStore`] fake.

use dlq_core::object_store::{ObjectMetadata, ObjectStore, ObjectStoreError};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

/// An object written to an [`InMemoryObjectStore`].
#[derive(Clone, Debug)]
pub struct StoredObject {
    /// The written bytes.
    pub body: Vec<u8>,
    /// The content type passed at write time.
    pub content_type: String,
    /// The metadata passed at write time.
    pub metadata: ObjectMetadata,
}

/// In-memory [`ObjectStore`] fake, keyed by object key.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

impl InMemoryObjectStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` has been written.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.objects.read().unwrap().contains_key(key)
    }

    /// Fetch the object written at `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().unwrap().get(key).cloned()
    }

    /// Remove every object.
    pub fn clear(&self) {
        self.objects.write().unwrap().clear();
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        metadata: ObjectMetadata,
    ) -> Pin<Box<dyn Future<Output = Result<(), ObjectStoreError>> + Send + '_>> {
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            self.objects.write().unwrap().insert(
                key,
                StoredObject {
                    body,
                    content_type,
                    metadata,
                },
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ObjectMetadata {
        ObjectMetadata {
            message_id: "m1".to_string(),
            source_queue: "orders-dlq".to_string(),
            category: "POISON_PILL".to_string(),
            confidence: 0.95,
        }
    }

    #[tokio::test]
    async fn put_overwrites_idempotently() {
        let store = InMemoryObjectStore::new();
        store
            .put("poison-pills/2026-07-28/orders-dlq/m1.json", b"{}".to_vec(), "application/json", metadata())
            .await
            .unwrap();
        store
            .put("poison-pills/2026-07-28/orders-dlq/m1.json", b"{\"v\":2}".to_vec(), "application/json", metadata())
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        let stored = store.get("poison-pills/2026-07-28/orders-dlq/m1.json").unwrap();
        assert_eq!(stored.body, b"{\"v\":2}");
    }
}
