//! Recent-deployments lookup used by the Monitor's enrichment step (§4.1)
//! and the Analyzer's deployment-correlation heuristic (§4.2).

use crate::model::DeploymentRef;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during deployment-store operations.
#[derive(Error, Debug, Clone)]
pub enum DeploymentStoreError {
    /// The underlying storage call failed.
    #[error("deployment store error: {0}")]
    StorageError(String),
}

/// Looks up deployments for a service within a trailing time window.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so this trait can be used
/// as `Arc<dyn DeploymentStore>`.
pub trait DeploymentStore: Send + Sync {
    /// Deployments for `service` in the `window_ms` milliseconds before `now`.
    /// Absence of any deployment is not an error — it is an empty `Vec` (§4.1:
    /// "Absence permitted").
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentStoreError::StorageError`] on failure.
    fn recent_deployments(
        &self,
        service: &str,
        now: chrono::DateTime<chrono::Utc>,
        window_ms: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DeploymentRef>, DeploymentStoreError>> + Send + '_>>;
}
