//! Postgres-backed collaborators for the DLQ recovery pipeline.
//!
//! Implements six of `dlq-core`'s trait seams against a single `PgPool`:
//! [`RecordStore`](dlq_core::record_store::RecordStore),
//! [`DeduplicationLedger`](dlq_core::ledger::DeduplicationLedger),
//! [`SemanticCache`](dlq_core::semantic_cache::SemanticCache),
//! [`DeploymentStore`](dlq_core::deployment_store::DeploymentStore),
//! [`MessageQueueClient`](dlq_core::queue::MessageQueueClient) and
//! [`FeatureFlags`](dlq_core::feature_flags::FeatureFlags).
//!
//! Each collaborator is a thin wrapper around a cloned `PgPool`, so the
//! service binary can construct one pool and hand out every collaborator.
//! The workspace has no message-queue or feature-flag vendor dependency,
//! so both of those seams are backed by Postgres tables here rather than
//! left unimplemented outside of tests.
//!
//! # Example
//!
//! ```ignore
//! use dlq_postgres::PostgresRecordStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = sqlx::PgPool::connect("postgres://localhost/dlq").await?;
//!     let records = PostgresRecordStore::new(pool);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod deployment_store;
mod feature_flags;
mod ledger;
mod queue;
mod record_store;
mod semantic_cache;

pub use deployment_store::PostgresDeploymentStore;
pub use feature_flags::PostgresFeatureFlags;
pub use ledger::PostgresLedger;
pub use queue::PostgresQueueClient;
pub use record_store::PostgresRecordStore;
pub use semantic_cache::PostgresSemanticCache;
