//! The message queue service the Monitor polls and the Executor re-enqueues
//! into.
//!
//! This is the "DLQ itself" external collaborator from `spec.md` §1: a
//! queue service with receive/delete/send-with-delay semantics and a
//! receipt-token model (SQS-shaped, but the trait does not assume any
//! particular vendor). Implementations are provided by `dlq-testing`
//! (in-memory, for tests) and by the service binary's wiring (HTTP-based,
//! for a real deployment) — this crate defines only the contract.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during queue operations.
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    /// The queue service could not be reached at all.
    #[error("queue transport error: {0}")]
    Transport(String),

    /// A specific queue name did not resolve to a real queue.
    #[error("unknown queue: {0}")]
    UnknownQueue(String),

    /// A delete or send operation referenced a receipt token that had
    /// already expired or been consumed.
    #[error("invalid or expired receipt token")]
    InvalidReceipt,
}

/// A queue discovered by name-pattern matching (§4.1 discovery contract).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueHandle {
    /// The queue's name, as matched against `dlq_name_pattern`.
    pub name: String,
}

/// One message received from a poll, before enrichment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Unique identifier within the source queue.
    pub message_id: String,
    /// Opaque token used to delete or otherwise acknowledge this specific delivery.
    pub receipt_token: String,
    /// Raw message body.
    pub body: Vec<u8>,
    /// Number of times the queue service itself has redelivered this message.
    pub receive_count: u32,
}

/// Attributes attached to a message re-enqueued by the Executor's Retry handler.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SendAttributes {
    /// `retryCount` attribute: the attempt number about to be made.
    pub retry_count: u32,
    /// `originalMessageId` attribute: ties the re-enqueued message back to its DLQ entry.
    pub original_message_id: String,
    /// `classificationCategory` attribute: `TRANSIENT`/`POISON_PILL`/`SYSTEMIC`.
    pub classification_category: String,
}

/// The queue service contract required by the Monitor (discover/receive/delete)
/// and the Executor's Retry handler (send-with-delay).
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so this trait can be used
/// as `Arc<dyn MessageQueueClient>`.
pub trait MessageQueueClient: Send + Sync {
    /// Discover all queues whose name matches `pattern` (substring match,
    /// e.g. the default `-dlq`). Discovery failures are logged by the
    /// caller and treated as "no queues this tick" (§4.1) — this method
    /// itself still returns a `Result` so the caller can decide.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Transport`] if the discovery call itself fails.
    fn discover_queues(
        &self,
        pattern: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<QueueHandle>, QueueError>> + Send + '_>>;

    /// Long-poll up to `max_messages` from `queue`, with the given
    /// visibility timeout and wait time.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::UnknownQueue`] or [`QueueError::Transport`] on failure.
    fn receive(
        &self,
        queue: &QueueHandle,
        max_messages: u32,
        visibility_timeout_s: u32,
        wait_time_s: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ReceivedMessage>, QueueError>> + Send + '_>>;

    /// Delete a message from its source queue by receipt token. Only
    /// called after the enriched event has been durably accepted by the
    /// bus (§4.1 invariant 4), or when the Monitor's hard-cap drops a
    /// runaway message.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidReceipt`] if the token is stale, or
    /// [`QueueError::Transport`] on failure.
    fn delete(
        &self,
        queue: &QueueHandle,
        receipt_token: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>>;

    /// Send `body` to `queue` (the *original* queue, not the DLQ) after
    /// `delay_s` seconds, carrying the given attributes (§4.3 Retry handler).
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Transport`] on failure.
    fn send_with_delay(
        &self,
        queue_name: &str,
        body: &[u8],
        delay_s: u32,
        attributes: SendAttributes,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>>;
}
