//! Semantic-cache (§3, §4.2 step 2): cross-message caching without
//! coordination. All readers agree on the key derivation
//! (`fingerprint::compute`); the record store behind this trait is the
//! only coordination point needed (§9).

use crate::model::SemanticCacheEntry;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during semantic cache operations.
#[derive(Error, Debug, Clone)]
pub enum SemanticCacheError {
    /// The underlying storage call failed.
    #[error("semantic cache error: {0}")]
    StorageError(String),
}

/// Semantic-cache contract, keyed by the 16-hex-char fingerprint.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so this trait can be used
/// as `Arc<dyn SemanticCache>`.
pub trait SemanticCache: Send + Sync {
    /// Fetch the cached entry for `hash`, if present and not expired.
    ///
    /// # Errors
    ///
    /// Returns [`SemanticCacheError::StorageError`] on failure. Per §4.2
    /// step 2, callers treat a failed read as a cache miss.
    fn get(
        &self,
        hash: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<SemanticCacheEntry>, SemanticCacheError>> + Send + '_>>;

    /// Write `entry` for `hash`. Non-fatal if it fails (§4.2 Persistence):
    /// callers proceed with publishing even if this write fails.
    ///
    /// # Errors
    ///
    /// Returns [`SemanticCacheError::StorageError`] on failure.
    fn put(
        &self,
        hash: &str,
        entry: SemanticCacheEntry,
    ) -> Pin<Box<dyn Future<Output = Result<(), SemanticCacheError>> + Send + '_>>;
}
