//! Alert publishing (§4.3 Escalate handler, §4.2 poison-pill notices).
//!
//! Distinct from [`crate::event_bus::EventBus`]: the event bus carries
//! pipeline-internal events (`MessageEnriched`/`MessageClassified`)
//! consumed by the next stage, while an [`AlertPublisher`] fans out
//! human-facing notices to an external topic (SNS-shaped in production).

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur while publishing an alert.
#[derive(Error, Debug, Clone)]
pub enum AlertError {
    /// The underlying publish call failed.
    #[error("alert publish error: {0}")]
    PublishFailed(String),
}

/// A human-facing alert, published once per poison-pill classification
/// and once per archive (§4.2, §4.3).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Alert {
    /// The message this alert concerns.
    pub message_id: String,
    /// The queue the message came from.
    pub source_queue: String,
    /// Human-readable summary, e.g. "poison-pill detected and archived".
    pub summary: String,
    /// The classification reasoning, surfaced verbatim for operators.
    pub reasoning: String,
}

/// Fan-out for operator-facing alerts.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so this trait can be used
/// as `Arc<dyn AlertPublisher>`.
pub trait AlertPublisher: Send + Sync {
    /// Publish `alert` to the alert topic.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::PublishFailed`] on failure. Per §4.3, a
    /// failed alert publish does not roll back the action it describes.
    fn publish(
        &self,
        alert: Alert,
    ) -> Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + '_>>;
}
