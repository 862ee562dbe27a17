//! Postgres-backed [`FeatureFlags`] (§11 ambient stack).
//!
//! Flags are read from a settings table and cached in atomics so the hot
//! path (consulted once per message by the Analyzer and Executor) never
//! makes a network round trip; [`refresh`](PostgresFeatureFlags::refresh)
//! re-reads the table and is expected to be driven by a periodic task in
//! the service binary.
//!
//! ```sql
//! CREATE TABLE feature_flags (
//!     key   TEXT PRIMARY KEY,
//!     value BOOLEAN NOT NULL
//! );
//! ```

use dlq_core::feature_flags::FeatureFlags;
use sqlx::{PgPool, Row};
use std::sync::atomic::{AtomicBool, Ordering};

const AUTO_REPLAY_KEY: &str = "auto_replay_enabled";
const LLM_CLASSIFICATION_KEY: &str = "llm_classification_enabled";
const INCIDENT_INTEGRATION_KEY: &str = "incident_integration_enabled";

/// Postgres-backed feature flag store, cached in memory between refreshes.
pub struct PostgresFeatureFlags {
    pool: PgPool,
    auto_replay_enabled: AtomicBool,
    llm_classification_enabled: AtomicBool,
    incident_integration_enabled: AtomicBool,
}

impl PostgresFeatureFlags {
    /// Create a new store over `pool`, with every flag defaulting to
    /// enabled until the first [`refresh`](Self::refresh) completes.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            auto_replay_enabled: AtomicBool::new(true),
            llm_classification_enabled: AtomicBool::new(true),
            incident_integration_enabled: AtomicBool::new(true),
        }
    }

    /// Re-read flag values from storage and update the cached atomics.
    /// Unknown keys are ignored; missing keys leave the cached value
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns a [`sqlx::Error`] if the read fails.
    pub async fn refresh(&self) -> Result<(), sqlx::Error> {
        let rows = sqlx::query("SELECT key, value FROM feature_flags WHERE key = ANY($1)")
            .bind([AUTO_REPLAY_KEY, LLM_CLASSIFICATION_KEY, INCIDENT_INTEGRATION_KEY].as_slice())
            .fetch_all(&self.pool)
            .await?;

        for row in rows {
            let key: String = row.get("key");
            let value: bool = row.get("value");
            match key.as_str() {
                AUTO_REPLAY_KEY => self.auto_replay_enabled.store(value, Ordering::Relaxed),
                LLM_CLASSIFICATION_KEY => self.llm_classification_enabled.store(value, Ordering::Relaxed),
                INCIDENT_INTEGRATION_KEY => self.incident_integration_enabled.store(value, Ordering::Relaxed),
                _ => {}
            }
        }
        Ok(())
    }
}

impl FeatureFlags for PostgresFeatureFlags {
    fn auto_replay_enabled(&self) -> bool {
        self.auto_replay_enabled.load(Ordering::Relaxed)
    }

    fn llm_classification_enabled(&self) -> bool {
        self.llm_classification_enabled.load(Ordering::Relaxed)
    }

    fn incident_integration_enabled(&self) -> bool {
        self.incident_integration_enabled.load(Ordering::Relaxed)
    }
}
