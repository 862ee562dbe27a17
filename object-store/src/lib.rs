//! Filesystem-backed [`ObjectStore`] for the Executor's Archive handler
//! (§4.3).
//!
//! Writes land at `<root>/<key>`, with a `.meta.json` sidecar carrying the
//! [`ObjectMetadata`] passed alongside the body — there being no object
//! storage service's bucket metadata to lean on here, the sidecar is this
//! implementation's substitute. A real deployment would swap this crate
//! for an S3- or GCS-backed one behind the same trait; this one exists so
//! the pipeline has a concrete, dependency-free `ObjectStore` to run
//! against locally.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use dlq_core::object_store::{ObjectMetadata, ObjectStore, ObjectStoreError};
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

/// Filesystem-backed [`ObjectStore`], rooted at a configured directory.
#[derive(Clone)]
pub struct FilesystemObjectStore {
    root: PathBuf,
}

impl FilesystemObjectStore {
    /// Build a store rooted at `root`. The directory is created lazily on
    /// first write, not here.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The full path a given archive key would be written to.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn sidecar_path(object_path: &Path) -> PathBuf {
        let mut sidecar = object_path.as_os_str().to_os_string();
        sidecar.push(".meta.json");
        PathBuf::from(sidecar)
    }
}

#[derive(Serialize)]
struct MetaSidecar {
    message_id: String,
    source_queue: String,
    category: String,
    confidence: f64,
    content_type: String,
}

impl ObjectStore for FilesystemObjectStore {
    fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        metadata: ObjectMetadata,
    ) -> Pin<Box<dyn Future<Output = Result<(), ObjectStoreError>> + Send + '_>> {
        let object_path = self.path_for(key);
        let content_type = content_type.to_string();
        Box::pin(async move {
            let parent = object_path.parent().unwrap_or_else(|| Path::new("."));
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ObjectStoreError::StorageError(format!("failed to create {}: {e}", parent.display())))?;

            tokio::fs::write(&object_path, &body)
                .await
                .map_err(|e| ObjectStoreError::StorageError(format!("failed to write {}: {e}", object_path.display())))?;

            let sidecar = MetaSidecar {
                message_id: metadata.message_id,
                source_queue: metadata.source_queue,
                category: metadata.category,
                confidence: metadata.confidence,
                content_type,
            };
            let sidecar_bytes = serde_json::to_vec_pretty(&sidecar)
                .map_err(|e| ObjectStoreError::StorageError(format!("failed to serialize metadata: {e}")))?;
            let sidecar_path = Self::sidecar_path(&object_path);
            tokio::fs::write(&sidecar_path, sidecar_bytes)
                .await
                .map_err(|e| ObjectStoreError::StorageError(format!("failed to write {}: {e}", sidecar_path.display())))?;

            tracing::info!(key = %key, bytes = body.len(), "archived object written");
            metrics::counter!("executor.archive.put").increment(1);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlq_core::object_store::archive_key;

    fn metadata() -> ObjectMetadata {
        ObjectMetadata {
            message_id: "m1".to_string(),
            source_queue: "orders-dlq".to_string(),
            category: "POISON_PILL".to_string(),
            confidence: 0.95,
        }
    }

    #[tokio::test]
    async fn put_writes_body_and_sidecar() {
        let dir = tempfile_dir("writes-body-and-sidecar");
        let store = FilesystemObjectStore::new(&dir);
        let date = chrono::NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let key = archive_key(date, "orders-dlq", "m1");

        store.put(&key, b"{\"error\":\"boom\"}".to_vec(), "application/json", metadata())
            .await
            .unwrap();

        let body = tokio::fs::read(store.path_for(&key)).await.unwrap();
        assert_eq!(body, b"{\"error\":\"boom\"}");

        let sidecar_path = FilesystemObjectStore::sidecar_path(&store.path_for(&key));
        let sidecar = tokio::fs::read_to_string(sidecar_path).await.unwrap();
        assert!(sidecar.contains("\"category\": \"POISON_PILL\""));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn put_is_idempotent_on_repeated_keys() {
        let dir = tempfile_dir("idempotent-repeated-keys");
        let store = FilesystemObjectStore::new(&dir);
        let key = "poison-pills/2026-07-28/orders-dlq/m1.json";

        store.put(key, b"first".to_vec(), "application/json", metadata()).await.unwrap();
        store.put(key, b"second".to_vec(), "application/json", metadata()).await.unwrap();

        let body = tokio::fs::read(store.path_for(key)).await.unwrap();
        assert_eq!(body, b"second");

        std::fs::remove_dir_all(&dir).ok();
    }

    fn tempfile_dir(test_name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("dlq-object-store-test-{}-{test_name}", std::process::id()));
        dir
    }
}
