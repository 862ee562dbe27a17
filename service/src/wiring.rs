//! Collaborator construction: one `PgPool` and one `RedpandaEventBus`,
//! fanned out into the three components' [`Environment`] bundles.

use crate::config::ServiceArgs;
use dlq_core::clock::{Clock, SystemClock};
use dlq_core::config::PipelineConfig;
use dlq_core::event_bus::EventBus;
use dlq_core::feature_flags::FeatureFlags;
use dlq_incident::{PagerDutyIncidentClient, SlackAlertPublisher};
use dlq_llm::{AnthropicClient, AnthropicDlqClassifier};
use dlq_object_store::FilesystemObjectStore;
use dlq_postgres::{
    PostgresDeploymentStore, PostgresFeatureFlags, PostgresLedger, PostgresQueueClient,
    PostgresRecordStore, PostgresSemanticCache,
};
use dlq_redpanda::RedpandaEventBus;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// Every long-lived collaborator the three pipeline components share,
/// plus the component-specific `Environment` bundles built from them.
pub struct Wiring {
    /// The shared Postgres pool, handed to the health server's readiness check.
    pub pool: PgPool,
    /// The feature-flag store, refreshed periodically by the service's own loop.
    pub feature_flags: Arc<PostgresFeatureFlags>,
    /// The Monitor's collaborator bundle.
    pub monitor_env: dlq_monitor::Environment,
    /// The Analyzer's collaborator bundle.
    pub analyzer_env: dlq_analyzer::Environment,
    /// The Executor's collaborator bundle.
    pub executor_env: dlq_executor::Environment,
}

/// Connect to Postgres, run migrations, connect to Redpanda, and build
/// every collaborator and `Environment` the pipeline components need.
///
/// # Errors
///
/// Returns an error if the database pool cannot be established, migrations
/// fail, the Redpanda producer cannot be created, or a `from_env`-style
/// collaborator is missing its required environment variable.
pub async fn build(args: &ServiceArgs, config: PipelineConfig) -> Result<Wiring, Box<dyn std::error::Error>> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Some(Duration::from_secs(600)))
        .max_lifetime(Some(Duration::from_secs(1800)))
        .connect(&args.database_url)
        .await?;
    tracing::info!("postgres pool established");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("migrations applied");

    let event_bus: Arc<dyn EventBus> = Arc::new(
        RedpandaEventBus::builder()
            .brokers(&args.redpanda_brokers)
            .producer_acks("all")
            .compression("lz4")
            .consumer_group("dlq-pipeline")
            .buffer_size(1000)
            .auto_offset_reset("latest")
            .build()?,
    );
    tracing::info!(brokers = %args.redpanda_brokers, "redpanda event bus established");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let feature_flags = Arc::new(PostgresFeatureFlags::new(pool.clone()));
    feature_flags.refresh().await?;
    let feature_flags_trait: Arc<dyn FeatureFlags> = feature_flags.clone();

    let ledger = Arc::new(PostgresLedger::new(pool.clone()));
    let record_store = Arc::new(PostgresRecordStore::new(pool.clone()));
    let semantic_cache = Arc::new(PostgresSemanticCache::new(pool.clone()));
    let deployment_store = Arc::new(PostgresDeploymentStore::new(pool.clone()));
    let queue = Arc::new(PostgresQueueClient::new(pool.clone()));
    let object_store = Arc::new(FilesystemObjectStore::new(args.archive_root.clone()));

    let llm_client = AnthropicClient::from_env()?;
    let llm_classifier = Arc::new(AnthropicDlqClassifier::new(
        llm_client,
        config.analyzer.llm_model.clone(),
        config.analyzer.llm_max_tokens,
        f64::from(config.analyzer.llm_temperature),
        config.analyzer.llm_timeout(),
    ));

    let incident_client = Arc::new(PagerDutyIncidentClient::from_env()?);
    let alert_publisher = Arc::new(SlackAlertPublisher::from_env()?);

    let monitor_env = dlq_monitor::Environment {
        queue: queue.clone(),
        ledger: ledger.clone(),
        record_store: record_store.clone(),
        deployment_store: deployment_store.clone(),
        event_bus: event_bus.clone(),
        clock: clock.clone(),
        config: config.monitor.clone(),
    };

    let analyzer_env = dlq_analyzer::Environment {
        semantic_cache,
        record_store: record_store.clone(),
        llm_classifier,
        event_bus: event_bus.clone(),
        feature_flags: feature_flags_trait.clone(),
        clock: clock.clone(),
        config: config.analyzer.clone(),
    };

    let executor_env = dlq_executor::Environment {
        queue,
        object_store,
        alert_publisher,
        event_bus,
        incident_client,
        record_store,
        feature_flags: feature_flags_trait,
        clock,
        config: config.executor.clone(),
        project: config.project.clone(),
    };

    Ok(Wiring {
        pool,
        feature_flags,
        monitor_env,
        analyzer_env,
        executor_env,
    })
}
