//! Event trait and related types for the bus that links Monitor, Analyzer
//! and Executor.
//!
//! Events on this bus are EventBridge-shaped: a `detail_type`, a JSON
//! `detail` body, and a source. Unlike an internal event-sourcing log,
//! these events are meant to be read by operators and other services, so
//! they're serialized as JSON rather than a binary format.
//!
//! # Example
//!
//! ```
//! use dlq_core::event::Event;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! enum PipelineEvent {
//!     MessageEnriched { message_id: String },
//!     MessageClassified { message_id: String },
//! }
//!
//! impl Event for PipelineEvent {
//!     fn event_type(&self) -> &'static str {
//!         match self {
//!             PipelineEvent::MessageEnriched { .. } => "MessageEnriched",
//!             PipelineEvent::MessageClassified { .. } => "MessageClassified",
//!         }
//!     }
//! }
//! ```

use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Error types for event operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize event to JSON.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from JSON.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),
}

/// An event that can be published to the bus and replayed by a consumer.
///
/// # Thread Safety
///
/// Events must be `Send + Sync + 'static` to be safely passed between
/// tasks in the async runtime.
pub trait Event: Send + Sync + 'static {
    /// Returns the event type identifier for this event (e.g.
    /// `"MessageEnriched"`); used as the bus's `detail_type`.
    fn event_type(&self) -> &'static str;

    /// Serialize this event to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        serde_json::to_vec(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Deserialize an event from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::DeserializationError` if the bytes are not
    /// valid JSON for this type.
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        serde_json::from_slice(bytes).map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}

/// A serialized event ready for publishing.
///
/// This struct carries the event type, the JSON-encoded detail, and an
/// optional JSON metadata blob. It's the wire format between pipeline
/// components and the event bus.
#[derive(Clone, Debug)]
pub struct SerializedEvent {
    /// The event type identifier (e.g. `"MessageEnriched"`).
    pub event_type: String,

    /// The JSON-encoded event payload.
    pub data: Vec<u8>,

    /// Optional metadata in JSON format.
    ///
    /// Common metadata fields:
    /// - `correlation_id`: Links related events across the pipeline
    /// - `source`: The publishing component (`monitor`, `analyzer`, `executor`)
    pub metadata: Option<serde_json::Value>,
}

impl SerializedEvent {
    /// Create a new serialized event.
    #[must_use]
    pub const fn new(event_type: String, data: Vec<u8>, metadata: Option<serde_json::Value>) -> Self {
        Self {
            event_type,
            data,
            metadata,
        }
    }

    /// Create a serialized event from an `Event` trait object.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    pub fn from_event<E: Event + Serialize>(
        event: &E,
        metadata: Option<serde_json::Value>,
    ) -> Result<Self, EventError> {
        Ok(Self {
            event_type: event.event_type().to_string(),
            data: event.to_bytes()?,
            metadata,
        })
    }
}

impl fmt::Display for SerializedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedEvent {{ type: {}, size: {} bytes }}",
            self.event_type,
            self.data.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    enum TestEvent {
        Created { id: String },
    }

    impl Event for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Created { .. } => "Created",
            }
        }
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = TestEvent::Created { id: "m-1".to_string() };
        let bytes = event.to_bytes().expect("serialization should succeed");
        let deserialized = TestEvent::from_bytes(&bytes).expect("deserialization should succeed");
        assert_eq!(event, deserialized);
    }

    #[test]
    fn serialized_event_from_event() {
        let event = TestEvent::Created { id: "m-2".to_string() };
        let serialized = SerializedEvent::from_event(&event, None).expect("should serialize");
        assert_eq!(serialized.event_type, "Created");
        assert!(!serialized.data.is_empty());
    }
}
