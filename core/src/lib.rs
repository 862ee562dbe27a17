//! # DLQ Recovery Pipeline — Core
//!
//! Shared kernel for the self-healing dead-letter-queue recovery
//! pipeline: the data model, the static heuristic rule table, the
//! semantic-fingerprint function, PII redaction, body parsing, and the
//! trait seams (`EventBus`, message queue, record store, ledger,
//! semantic cache, deployment store, object store, alert publisher,
//! incident client, LLM classifier) that the three pipeline components —
//! Monitor, Analyzer, Executor — are built against.
//!
//! Every collaborator this crate does not implement itself (the queue
//! service, the record store, the object store, the alert topic, the
//! incident API, the LLM API) is expressed here as a `Send + Sync` trait
//! returning `Pin<Box<dyn Future<...> + Send + '_>>`, so that concrete
//! implementations — in `dlq-postgres`, `dlq-redpanda`, `dlq-llm`,
//! `dlq-incident`, `dlq-object-store`, and the in-memory fakes in
//! `dlq-testing` — can be stored behind `Arc<dyn Trait>` and swapped
//! between production and tests without touching pipeline logic.

pub mod alert;
pub mod clock;
pub mod config;
pub mod deployment_store;
pub mod error_patterns;
pub mod event;
pub mod event_bus;
pub mod feature_flags;
pub mod fingerprint;
pub mod incident;
pub mod ledger;
pub mod llm;
pub mod model;
pub mod object_store;
pub mod parsing;
pub mod queue;
pub mod record_store;
pub mod redaction;
pub mod semantic_cache;

pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
