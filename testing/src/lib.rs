//! In-memory fakes for every `dlq-core` collaborator trait.
//!
//! Each fake is backed by an `Arc<RwLock<...>>` (or, for the event bus, a
//! `tokio::sync::broadcast` channel) so it can be cloned cheaply and
//! shared between a test's setup code and the component under test —
//! mirroring the way the real Postgres/Redpanda/HTTP implementations are
//! handed out as `Arc<dyn Trait>`. Every fake exposes a handful of
//! test-ergonomics helpers (`new`, `clear`, `len`, `is_empty`) beyond the
//! trait itself.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

pub mod alert;
pub mod clock;
pub mod deployment_store;
pub mod event_bus;
pub mod feature_flags;
pub mod incident;
pub mod ledger;
pub mod llm;
pub mod object_store;
pub mod queue;
pub mod record_store;
pub mod semantic_cache;

pub use alert::InMemoryAlertPublisher;
pub use clock::FixedClock;
pub use deployment_store::InMemoryDeploymentStore;
pub use event_bus::InMemoryEventBus;
pub use feature_flags::ToggleFlags;
pub use incident::InMemoryIncidentClient;
pub use ledger::InMemoryLedger;
pub use llm::{FixedLlmClassifier, ScriptedLlmClassifier};
pub use object_store::InMemoryObjectStore;
pub use queue::InMemoryQueueClient;
pub use record_store::InMemoryRecordStore;
pub use semantic_cache::InMemorySemanticCache;
