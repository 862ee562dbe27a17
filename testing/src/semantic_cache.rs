//! An in-memory [`dlq_core::semantic_cache::SemanticCache`] fake.

use dlq_core::model::SemanticCacheEntry;
use dlq_core::semantic_cache::{SemanticCache, SemanticCacheError};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

/// In-memory [`SemanticCache`] fake, keyed by the 16-hex-char fingerprint.
#[derive(Clone, Default)]
pub struct InMemorySemanticCache {
    entries: Arc<RwLock<HashMap<String, SemanticCacheEntry>>>,
}

impl InMemorySemanticCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `hash` is present, ignoring TTL.
    #[must_use]
    pub fn contains_key(&self, hash: &str) -> bool {
        self.entries.read().unwrap().contains_key(hash)
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

impl SemanticCache for InMemorySemanticCache {
    fn get(
        &self,
        hash: &str,
    ) -> Pin<
        Box<dyn Future<Output = Result<Option<SemanticCacheEntry>, SemanticCacheError>> + Send + '_>,
    > {
        let hash = hash.to_string();
        Box::pin(async move { Ok(self.entries.read().unwrap().get(&hash).cloned()) })
    }

    fn put(
        &self,
        hash: &str,
        entry: SemanticCacheEntry,
    ) -> Pin<Box<dyn Future<Output = Result<(), SemanticCacheError>> + Send + '_>> {
        let hash = hash.to_string();
        Box::pin(async move {
            self.entries.write().unwrap().insert(hash, entry);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dlq_core::model::{Category, RecommendedAction};

    fn entry() -> SemanticCacheEntry {
        SemanticCacheEntry {
            category: Category::Transient,
            confidence: 0.9,
            reasoning: "network blip".to_string(),
            recommended_action: RecommendedAction::Replay {
                retry_delay_s: 30,
                max_retries: 5,
            },
            cached_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = InMemorySemanticCache::new();
        cache.put("abc123", entry()).await.unwrap();
        let fetched = cache.get("abc123").await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn miss_returns_none() {
        let cache = InMemorySemanticCache::new();
        assert!(cache.get("missing").await.unwrap().is_none());
    }
}
