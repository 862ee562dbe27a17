//! Service binary wiring the Monitor, Analyzer and Executor to their
//! production collaborators and running all three (§5):
//!
//! - Monitor runs on a fixed-interval tick.
//! - Analyzer and Executor are event-bus consumers, each driven by a
//!   `message-enriched`/`message-classified` subscription respectively.
//!
//! Run with: `dlq-service --database-url postgres://... `
//! Health: `http://<bind-addr>/health`
//! Metrics: `http://<metrics-addr>/metrics`

mod config;
mod health;
mod wiring;

use clap::Parser;
use config::ServiceArgs;
use dlq_resilience::metrics::MetricsServer;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = ServiceArgs::parse();
    let pipeline_config = config::load_pipeline_config(&args.config_path)?;
    tracing::info!(project = %pipeline_config.project, "pipeline configuration loaded");

    let mut metrics_server = MetricsServer::new(args.metrics_addr);
    metrics_server.start()?;
    let metrics_server = Arc::new(metrics_server);

    let wiring::Wiring {
        pool,
        feature_flags,
        monitor_env,
        analyzer_env,
        executor_env,
    } = wiring::build(&args, pipeline_config).await?;

    let (shutdown_tx, _) = watch::channel(false);

    let mut tasks = Vec::new();

    tasks.push(tokio::spawn(monitor_loop(
        monitor_env,
        args.monitor_tick_interval_s,
        shutdown_tx.subscribe(),
    )));
    tasks.push(tokio::spawn(analyzer_loop(analyzer_env, shutdown_tx.subscribe())));
    tasks.push(tokio::spawn(executor_loop(executor_env, shutdown_tx.subscribe())));
    tasks.push(tokio::spawn(feature_flag_refresh_loop(
        feature_flags,
        args.feature_flag_refresh_interval_s,
        shutdown_tx.subscribe(),
    )));

    let health_listener = tokio::net::TcpListener::bind(args.bind_addr).await?;
    tracing::info!(addr = %args.bind_addr, "health endpoints listening");
    let mut health_shutdown_rx = shutdown_tx.subscribe();
    let health_handle = tokio::spawn(async move {
        if let Err(error) = axum::serve(health_listener, health::health_router(pool))
            .with_graceful_shutdown(async move {
                let _ = health_shutdown_rx.changed().await;
            })
            .await
        {
            tracing::error!(%error, "health server exited with an error");
        }
    });

    let metrics_listener = tokio::net::TcpListener::bind(args.metrics_addr).await?;
    tracing::info!(addr = %args.metrics_addr, "metrics endpoint listening");
    let mut metrics_shutdown_rx = shutdown_tx.subscribe();
    let metrics_handle = tokio::spawn(async move {
        if let Err(error) = axum::serve(metrics_listener, health::metrics_router(metrics_server))
            .with_graceful_shutdown(async move {
                let _ = metrics_shutdown_rx.changed().await;
            })
            .await
        {
            tracing::error!(%error, "metrics server exited with an error");
        }
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(error) => tracing::error!(%error, "failed to listen for shutdown signal"),
    }

    let _ = shutdown_tx.send(true);

    for task in tasks {
        if let Err(error) = task.await {
            tracing::warn!(%error, "pipeline task did not shut down cleanly");
        }
    }
    if let Err(error) = health_handle.await {
        tracing::warn!(%error, "health server task did not shut down cleanly");
    }
    if let Err(error) = metrics_handle.await {
        tracing::warn!(%error, "metrics server task did not shut down cleanly");
    }

    tracing::info!("shutdown complete");
    Ok(())
}

async fn monitor_loop(
    env: dlq_monitor::Environment,
    tick_interval_s: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(tick_interval_s));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let summary = dlq_monitor::run_tick(&env).await;
                tracing::info!(
                    queues_discovered = summary.queues_discovered,
                    messages_received = summary.messages_received,
                    messages_enriched = summary.messages_enriched,
                    messages_dropped_hard_cap = summary.messages_dropped_hard_cap,
                    messages_failed = summary.messages_failed,
                    "monitor tick complete"
                );
            }
            _ = shutdown_rx.changed() => {
                tracing::info!("monitor loop shutting down");
                break;
            }
        }
    }
}

async fn analyzer_loop(env: dlq_analyzer::Environment, mut shutdown_rx: watch::Receiver<bool>) {
    let mut stream = match env.event_bus.subscribe(&[dlq_monitor::MESSAGE_ENRICHED_TOPIC]).await {
        Ok(stream) => stream,
        Err(error) => {
            tracing::error!(%error, "analyzer failed to subscribe to message-enriched");
            return;
        }
    };

    loop {
        tokio::select! {
            item = stream.next() => {
                match item {
                    Some(Ok(event)) => match serde_json::from_slice(&event.data) {
                        Ok(message) => {
                            dlq_analyzer::classify_and_publish(&env, message).await;
                        }
                        Err(error) => tracing::error!(%error, "failed to decode MessageEnriched payload"),
                    },
                    Some(Err(error)) => tracing::error!(%error, "message-enriched stream error"),
                    None => break,
                }
            }
            _ = shutdown_rx.changed() => {
                tracing::info!("analyzer loop shutting down");
                break;
            }
        }
    }
}

async fn executor_loop(env: dlq_executor::Environment, mut shutdown_rx: watch::Receiver<bool>) {
    let mut stream = match env.event_bus.subscribe(&[dlq_analyzer::MESSAGE_CLASSIFIED_TOPIC]).await {
        Ok(stream) => stream,
        Err(error) => {
            tracing::error!(%error, "executor failed to subscribe to message-classified");
            return;
        }
    };

    loop {
        tokio::select! {
            item = stream.next() => {
                match item {
                    Some(Ok(event)) => match serde_json::from_slice(&event.data) {
                        Ok(payload) => {
                            dlq_executor::handle_classified(&env, payload).await;
                        }
                        Err(error) => tracing::error!(%error, "failed to decode MessageClassified payload"),
                    },
                    Some(Err(error)) => tracing::error!(%error, "message-classified stream error"),
                    None => break,
                }
            }
            _ = shutdown_rx.changed() => {
                tracing::info!("executor loop shutting down");
                break;
            }
        }
    }
}

async fn feature_flag_refresh_loop(
    feature_flags: Arc<dlq_postgres::PostgresFeatureFlags>,
    interval_s: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_s));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(error) = feature_flags.refresh().await {
                    tracing::warn!(%error, "feature flag refresh failed");
                }
            }
            _ = shutdown_rx.changed() => {
                tracing::info!("feature flag refresh loop shutting down");
                break;
            }
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dlq_service=info,dlq_monitor=info,dlq_analyzer=info,dlq_executor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_target(true))
        .init();
}
