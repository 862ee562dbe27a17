//! Event bus abstraction linking Monitor, Analyzer and Executor.
//!
//! Events flow forward only: Monitor publishes `MessageEnriched`, Analyzer
//! consumes it and publishes `MessageClassified`, Executor consumes that.
//! The Executor also uses this trait's `publish` side to send poison-pill
//! alerts to their topic.
//!
//! # Key Principles
//!
//! - **At-least-once delivery**: events may be delivered multiple times.
//! - **Idempotency**: every consumer in this pipeline is keyed on
//!   `message_id`, so duplicate delivery is handled by construction rather
//!   than by a dedup layer in the bus itself.
//! - **Ordered within partition**: events from the same source queue
//!   maintain order.
//!
//! # Topic Naming Convention
//!
//! - `message-enriched` — published by the Monitor.
//! - `message-classified` — published by the Analyzer.
//! - `poison-pill-alerts` — published by the Executor's Archive handler.
//!
//! # Implementations
//!
//! - `InMemoryEventBus` (`dlq-testing`) — for tests: fast, synchronous.
//! - `RedpandaEventBus` (`dlq-redpanda`) — for production: Kafka-compatible.

use crate::event::SerializedEvent;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the event bus.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish an event to a topic.
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed.
        topic: String,
        /// The reason for failure.
        reason: String,
    },

    /// Failed to subscribe to topics.
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe.
        topics: Vec<String>,
        /// The reason for failure.
        reason: String,
    },

    /// Failed to deserialize an event.
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// A broker/transport-level error occurred outside of a specific
    /// publish or subscribe call (e.g. a consumer-stream read failure).
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Generic error for other failures.
    #[error("Event bus error: {0}")]
    Other(String),
}

/// Stream of events from subscriptions.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<SerializedEvent, EventBusError>> + Send>>;

/// Trait for event bus implementations.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
/// `async fn` to enable trait object usage (`Arc<dyn EventBus>`), needed
/// because components are constructed with a bag of trait objects rather
/// than monomorphized generics.
pub trait EventBus: Send + Sync {
    /// Publish an event to a topic.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the publish operation fails.
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a stream of events.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}
