//! Service-level configuration: CLI flags/environment variables for the
//! things a [`dlq_core::config::PipelineConfig`] doesn't cover — where to
//! find the pipeline config file, and how to reach every collaborator's
//! backing service.

use clap::Parser;
use std::net::SocketAddr;

/// Environment and CLI surface for the service binary.
///
/// Every field can be set by flag or by its `env` variable; the flag
/// takes precedence when both are present, matching `clap`'s default
/// resolution order.
#[derive(Debug, Clone, Parser)]
#[command(name = "dlq-service", about = "Self-healing DLQ recovery pipeline")]
pub struct ServiceArgs {
    /// Path to the pipeline's TOML configuration file. Missing sections
    /// fall back to their defaults; a missing file falls back to an
    /// entirely default [`dlq_core::config::PipelineConfig`].
    #[arg(long, env = "PIPELINE_CONFIG_PATH", default_value = "config/pipeline.toml")]
    pub config_path: String,

    /// Postgres connection string backing the ledger, record store,
    /// semantic cache, deployment store, queue and feature flags.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Comma-separated Redpanda/Kafka broker list.
    #[arg(long, env = "REDPANDA_BROKERS", default_value = "localhost:9092")]
    pub redpanda_brokers: String,

    /// Directory the Executor's Archive handler writes poison-pill bodies to.
    #[arg(long, env = "ARCHIVE_ROOT", default_value = "./archive")]
    pub archive_root: String,

    /// Address the health-check HTTP server binds to.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// Address the Prometheus `/metrics` endpoint binds to.
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:9090")]
    pub metrics_addr: SocketAddr,

    /// How often the Monitor tick runs, in seconds.
    #[arg(long, env = "MONITOR_TICK_INTERVAL_S", default_value_t = 15)]
    pub monitor_tick_interval_s: u64,

    /// How often `PostgresFeatureFlags` re-reads the flags table, in seconds.
    #[arg(long, env = "FEATURE_FLAG_REFRESH_INTERVAL_S", default_value_t = 30)]
    pub feature_flag_refresh_interval_s: u64,
}

/// Read and parse the pipeline config file named by `path`. A missing
/// file is not an error: the pipeline runs on defaults and a warning is
/// logged by the caller.
///
/// # Errors
///
/// Returns [`dlq_core::config::ConfigError`] if the file exists but fails
/// to parse or validate.
pub fn load_pipeline_config(
    path: &str,
) -> Result<dlq_core::config::PipelineConfig, dlq_core::config::ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(body) => dlq_core::config::PipelineConfig::from_toml(&body),
        Err(error) => {
            tracing::warn!(%error, path = %path, "pipeline config file not found, using defaults");
            Ok(dlq_core::config::PipelineConfig::default())
        }
    }
}
