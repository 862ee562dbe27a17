//! Postgres-backed [`DeploymentStore`].
//!
//! ```sql
//! CREATE TABLE deployments (
//!     id           TEXT NOT NULL,
//!     service      TEXT NOT NULL,
//!     version      TEXT NOT NULL,
//!     deployed_at  TIMESTAMPTZ NOT NULL,
//!     author       TEXT NOT NULL,
//!     PRIMARY KEY (id, service)
//! );
//! CREATE INDEX deployments_service_deployed_at_idx ON deployments (service, deployed_at);
//! ```

use dlq_core::deployment_store::{DeploymentStore, DeploymentStoreError};
use dlq_core::model::DeploymentRef;
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;

/// Postgres-backed deployment history lookup.
pub struct PostgresDeploymentStore {
    pool: PgPool,
}

impl PostgresDeploymentStore {
    /// Create a new deployment store over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DeploymentStore for PostgresDeploymentStore {
    fn recent_deployments(
        &self,
        service: &str,
        now: chrono::DateTime<chrono::Utc>,
        window_ms: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DeploymentRef>, DeploymentStoreError>> + Send + '_>> {
        let service = service.to_string();
        Box::pin(async move {
            let window_start = now - chrono::Duration::milliseconds(window_ms);

            let rows = sqlx::query(
                r"
                SELECT id, version, deployed_at, author
                FROM deployments
                WHERE service = $1 AND deployed_at BETWEEN $2 AND $3
                ORDER BY deployed_at DESC
                ",
            )
            .bind(&service)
            .bind(window_start)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DeploymentStoreError::StorageError(e.to_string()))?;

            Ok(rows
                .iter()
                .map(|row| DeploymentRef {
                    id: row.get("id"),
                    version: row.get("version"),
                    deployed_at: row.get("deployed_at"),
                    author: row.get("author"),
                })
                .collect())
        })
    }
}
