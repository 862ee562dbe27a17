//! Prometheus metrics for the DLQ recovery pipeline.
//!
//! This module provides metric collection for:
//! - Monitor: messages enriched, dropped at the hard retry cap, queue poll
//!   latency.
//! - Analyzer: classification latency and outcome, by category and by
//!   model tag (heuristic / cache / LLM / fallback).
//! - Executor: action outcome, retry scheduling.
//! - Circuit breaker and retry: shared by every call to the LLM classifier,
//!   the incident API, and the alert topic.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors that can occur while building or serving the metrics endpoint.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build the Prometheus recorder.
    #[error("Failed to build metrics recorder: {0}")]
    Build(String),

    /// Failed to install the recorder as the global default.
    #[error("Failed to install metrics recorder: {0}")]
    Install(String),

    /// Failed to bind the metrics HTTP listener.
    #[error("Failed to bind metrics endpoint on {0}: {1}")]
    Bind(SocketAddr, String),
}

/// Latency histogram buckets, in milliseconds, shared across all pipeline
/// histograms. Tuned for operations ranging from a cache lookup (sub-ms)
/// to an LLM classification call (multi-second).
const LATENCY_BUCKETS_MS: &[f64] = &[
    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0,
];

/// A running Prometheus exporter serving `/metrics` on a bound address.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new, unstarted metrics server bound to `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Build the Prometheus recorder, register metric descriptions, and
    /// install it as the global recorder.
    ///
    /// Tolerates an "already initialized" error from the global recorder
    /// so that repeated calls across tests in the same process don't fail.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Build`] if the recorder cannot be
    /// constructed, or [`MetricsError::Install`] if a *different* failure
    /// occurs while installing it globally.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Suffix("latency_ms".to_string()),
                LATENCY_BUCKETS_MS,
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        register_metrics();

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) if e.to_string().contains("already") => Ok(()),
            Err(e) => Err(MetricsError::Install(e.to_string())),
        }
    }

    /// The address this server was configured to bind.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The installed recorder handle, if [`start`](Self::start) has run.
    #[must_use]
    pub fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render the current metrics in Prometheus text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle
            .as_ref()
            .map_or_else(String::new, PrometheusHandle::render)
    }
}

fn register_metrics() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        "dlq_monitor_messages_enriched_total",
        "Messages successfully enriched and published by the Monitor"
    );
    describe_counter!(
        "dlq_monitor_messages_dropped_total",
        "Messages dropped at the hard retry cap without further processing"
    );
    describe_histogram!(
        "dlq_monitor_poll_latency_ms",
        "Latency of a single queue poll, in milliseconds"
    );

    describe_histogram!(
        "dlq_analyzer_classification_latency_ms",
        "Latency of a single classification decision, in milliseconds"
    );
    describe_counter!(
        "dlq_analyzer_classifications_total",
        "Classification decisions, tagged by category and model_tag"
    );
    describe_counter!(
        "dlq_analyzer_semantic_cache_hits_total",
        "Semantic cache lookups that returned a cached classification"
    );

    describe_counter!(
        "dlq_executor_outcomes_total",
        "Executor action outcomes, tagged by category and outcome"
    );
    describe_counter!(
        "dlq_executor_retries_scheduled_total",
        "Replay actions scheduled by the Executor"
    );

    describe_gauge!(
        "dlq_circuit_breaker_state",
        "Circuit breaker state: 0=closed, 1=open, 2=half-open"
    );
    describe_counter!("dlq_circuit_breaker_calls_total", "Total calls through a circuit breaker");
    describe_counter!(
        "dlq_circuit_breaker_successes_total",
        "Calls through a circuit breaker that succeeded"
    );
    describe_counter!(
        "dlq_circuit_breaker_failures_total",
        "Calls through a circuit breaker that failed"
    );
    describe_counter!(
        "dlq_circuit_breaker_rejections_total",
        "Calls rejected outright because the circuit was open"
    );

    describe_counter!("dlq_retry_attempts_total", "Retry attempts made across all retry policies");
    describe_counter!(
        "dlq_retry_successes_total",
        "Operations that eventually succeeded after one or more retries"
    );
    describe_counter!(
        "dlq_retry_exhausted_total",
        "Operations that exhausted their retry budget without succeeding"
    );
}

/// Recorders for Monitor-stage metrics.
pub struct MonitorMetrics;

impl MonitorMetrics {
    /// Record one enriched message published for the given source queue.
    pub fn record_enriched(source_queue: &str) {
        metrics::counter!("dlq_monitor_messages_enriched_total", "source_queue" => source_queue.to_string())
            .increment(1);
    }

    /// Record one message dropped at the hard retry cap.
    pub fn record_dropped(source_queue: &str) {
        metrics::counter!("dlq_monitor_messages_dropped_total", "source_queue" => source_queue.to_string())
            .increment(1);
    }

    /// Record the latency of a single queue poll.
    pub fn record_poll_latency_ms(source_queue: &str, latency_ms: f64) {
        metrics::histogram!("dlq_monitor_poll_latency_ms", "source_queue" => source_queue.to_string())
            .record(latency_ms);
    }
}

/// Recorders for Analyzer-stage metrics.
pub struct AnalyzerMetrics;

impl AnalyzerMetrics {
    /// Record a classification decision and its latency.
    pub fn record_classification(category: &str, model_tag: &str, latency_ms: f64) {
        metrics::counter!(
            "dlq_analyzer_classifications_total",
            "category" => category.to_string(),
            "model_tag" => model_tag.to_string(),
        )
        .increment(1);
        metrics::histogram!("dlq_analyzer_classification_latency_ms", "model_tag" => model_tag.to_string())
            .record(latency_ms);
    }

    /// Record a semantic-cache hit.
    pub fn record_cache_hit() {
        metrics::counter!("dlq_analyzer_semantic_cache_hits_total").increment(1);
    }
}

/// Recorders for Executor-stage metrics.
pub struct ExecutorMetrics;

impl ExecutorMetrics {
    /// Record the outcome of an executed action.
    pub fn record_outcome(category: &str, outcome: &str) {
        metrics::counter!(
            "dlq_executor_outcomes_total",
            "category" => category.to_string(),
            "outcome" => outcome.to_string(),
        )
        .increment(1);
    }

    /// Record a replay scheduled for a future retry.
    pub fn record_retry_scheduled() {
        metrics::counter!("dlq_executor_retries_scheduled_total").increment(1);
    }
}

/// Recorders for [`crate::circuit_breaker::CircuitBreaker`] state transitions and calls.
pub struct CircuitBreakerMetrics;

impl CircuitBreakerMetrics {
    /// Record the breaker's current state (0=closed, 1=open, 2=half-open).
    pub fn record_state(name: &str, state: u8) {
        metrics::gauge!("dlq_circuit_breaker_state", "breaker" => name.to_string())
            .set(f64::from(state));
    }

    /// Record a call attempted through the breaker.
    pub fn record_call(name: &str) {
        metrics::counter!("dlq_circuit_breaker_calls_total", "breaker" => name.to_string()).increment(1);
    }

    /// Record a call that succeeded.
    pub fn record_success(name: &str) {
        metrics::counter!("dlq_circuit_breaker_successes_total", "breaker" => name.to_string())
            .increment(1);
    }

    /// Record a call that failed.
    pub fn record_failure(name: &str) {
        metrics::counter!("dlq_circuit_breaker_failures_total", "breaker" => name.to_string())
            .increment(1);
    }

    /// Record a call rejected because the breaker was open.
    pub fn record_rejection(name: &str) {
        metrics::counter!("dlq_circuit_breaker_rejections_total", "breaker" => name.to_string())
            .increment(1);
    }
}

/// Recorders for [`crate::retry::retry_with_backoff`] and [`crate::retry::retry_with_predicate`].
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a single retry attempt.
    pub fn record_attempt(operation: &str) {
        metrics::counter!("dlq_retry_attempts_total", "operation" => operation.to_string()).increment(1);
    }

    /// Record an operation that eventually succeeded.
    pub fn record_success(operation: &str) {
        metrics::counter!("dlq_retry_successes_total", "operation" => operation.to_string())
            .increment(1);
    }

    /// Record an operation that exhausted its retry budget.
    pub fn record_exhausted(operation: &str) {
        metrics::counter!("dlq_retry_exhausted_total", "operation" => operation.to_string())
            .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_server_new_holds_no_handle_until_started() {
        let server = MetricsServer::new("127.0.0.1:9000".parse().unwrap());
        assert!(server.handle().is_none());
        assert_eq!(server.render(), "");
    }

    #[test]
    fn recorders_do_not_panic_without_a_started_server() {
        MonitorMetrics::record_enriched("orders-dlq");
        MonitorMetrics::record_dropped("orders-dlq");
        MonitorMetrics::record_poll_latency_ms("orders-dlq", 12.5);
        AnalyzerMetrics::record_classification("TRANSIENT", "heuristic", 3.2);
        AnalyzerMetrics::record_cache_hit();
        ExecutorMetrics::record_outcome("TRANSIENT", "success");
        ExecutorMetrics::record_retry_scheduled();
        CircuitBreakerMetrics::record_state("llm-classifier", 0);
        CircuitBreakerMetrics::record_call("llm-classifier");
        CircuitBreakerMetrics::record_success("llm-classifier");
        CircuitBreakerMetrics::record_failure("llm-classifier");
        CircuitBreakerMetrics::record_rejection("llm-classifier");
        RetryMetrics::record_attempt("incident.trigger");
        RetryMetrics::record_success("incident.trigger");
        RetryMetrics::record_exhausted("incident.trigger");
    }
}
