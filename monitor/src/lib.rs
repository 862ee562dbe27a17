//! Monitor component (§4.1): discover DLQs, poll them in parallel,
//! deduplicate against the ledger, enrich, publish `MessageEnriched`, and
//! delete the source message once the publish is durably accepted.
//!
//! A [`Environment`] bundles every collaborator this component needs as a
//! trait object, so the same logic runs unchanged against the in-memory
//! fakes in `dlq-testing` or the Postgres/Redpanda-backed implementations
//! wired up by `dlq-service`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dlq_core::clock::Clock;
use dlq_core::config::MonitorConfig;
use dlq_core::deployment_store::DeploymentStore;
use dlq_core::event::SerializedEvent;
use dlq_core::event_bus::EventBus;
use dlq_core::ledger::DeduplicationLedger;
use dlq_core::model::{EnrichedMessage, LedgerEntry};
use dlq_core::parsing::{derive_affected_service, parse_error_pattern};
use dlq_core::queue::{MessageQueueClient, QueueHandle, ReceivedMessage};
use dlq_core::record_store::RecordStore;
use std::sync::Arc;

/// Topic the Monitor publishes enriched messages to (§6).
pub const MESSAGE_ENRICHED_TOPIC: &str = "message-enriched";

/// Every collaborator the Monitor needs, bundled for a single tick.
#[derive(Clone)]
pub struct Environment {
    /// The queue service: discovery, receive, delete.
    pub queue: Arc<dyn MessageQueueClient>,
    /// The deduplication/retry ledger.
    pub ledger: Arc<dyn DeduplicationLedger>,
    /// The classification record store, queried for `similar_failures_last_hour`.
    pub record_store: Arc<dyn RecordStore>,
    /// The deployment store, queried for `recent_deployments`.
    pub deployment_store: Arc<dyn DeploymentStore>,
    /// The event bus `MessageEnriched` is published to.
    pub event_bus: Arc<dyn EventBus>,
    /// Clock abstraction, so TTL/window arithmetic is testable.
    pub clock: Arc<dyn Clock>,
    /// Monitor-section configuration.
    pub config: MonitorConfig,
}

/// Outcome counters for one Monitor invocation, across every discovered queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Number of queues matched by `dlq_name_pattern`.
    pub queues_discovered: usize,
    /// Messages received across all queues this tick.
    pub messages_received: u32,
    /// Messages successfully enriched, published and deleted.
    pub messages_enriched: u32,
    /// Messages dropped because their ledger `retry_count` had reached the hard cap.
    pub messages_dropped_hard_cap: u32,
    /// Messages whose processing failed and were left in place for redelivery.
    pub messages_failed: u32,
}

impl TickSummary {
    fn merge(&mut self, other: Self) {
        self.messages_received += other.messages_received;
        self.messages_enriched += other.messages_enriched;
        self.messages_dropped_hard_cap += other.messages_dropped_hard_cap;
        self.messages_failed += other.messages_failed;
    }
}

/// Run one Monitor invocation: discover, poll every queue concurrently,
/// and process each queue's messages sequentially (§5).
///
/// Discovery failures are logged and treated as "no queues this tick"
/// (§4.1); they never propagate as an error out of this function, matching
/// the spec's "a single run becomes a no-op" behavior.
pub async fn run_tick(env: &Environment) -> TickSummary {
    let queues = match env
        .queue
        .discover_queues(&env.config.dlq_name_pattern)
        .await
    {
        Ok(queues) => queues,
        Err(error) => {
            tracing::warn!(%error, pattern = %env.config.dlq_name_pattern, "queue discovery failed, skipping this tick");
            Vec::new()
        }
    };

    let mut summary = TickSummary {
        queues_discovered: queues.len(),
        ..TickSummary::default()
    };

    let polls = queues.iter().map(|queue| poll_queue(env, queue));
    for outcome in futures::future::join_all(polls).await {
        summary.merge(outcome);
    }

    metrics::counter!("monitor.tick.queues_discovered").increment(summary.queues_discovered as u64);
    metrics::counter!("monitor.tick.messages_enriched").increment(u64::from(summary.messages_enriched));
    summary
}

/// Poll one queue and process its messages sequentially. A poll failure on
/// this queue is isolated: other queues keep running (§4.1).
async fn poll_queue(env: &Environment, queue: &QueueHandle) -> TickSummary {
    let received = match env
        .queue
        .receive(
            queue,
            env.config.max_messages_per_poll,
            env.config.visibility_timeout_s,
            env.config.long_poll_wait_s,
        )
        .await
    {
        Ok(messages) => messages,
        Err(error) => {
            tracing::warn!(%error, queue = %queue.name, "poll failed for queue, skipping");
            return TickSummary::default();
        }
    };

    let mut summary = TickSummary {
        messages_received: u32::try_from(received.len()).unwrap_or(u32::MAX),
        ..TickSummary::default()
    };

    // Sequential per queue: keeps per-queue ordering stable and the
    // deduplication writes simple (§5).
    for message in received {
        match process_message(env, queue, message).await {
            Disposition::Enriched => summary.messages_enriched += 1,
            Disposition::DroppedHardCap => summary.messages_dropped_hard_cap += 1,
            Disposition::Failed => summary.messages_failed += 1,
        }
    }

    summary
}

enum Disposition {
    Enriched,
    DroppedHardCap,
    Failed,
}

async fn process_message(
    env: &Environment,
    queue: &QueueHandle,
    message: ReceivedMessage,
) -> Disposition {
    let now = env.clock.now();

    let existing = lookup_ledger_fail_open(env, &message.message_id, &queue.name).await;

    if let Some(entry) = &existing {
        if entry.retry_count >= env.config.max_retries_monitor {
            tracing::warn!(
                message_id = %message.message_id,
                queue = %queue.name,
                retry_count = entry.retry_count,
                "retry_count at hard cap, dropping runaway message"
            );
            return drop_runaway(env, queue, &message).await;
        }
    }

    let retry_count = match env
        .ledger
        .upsert_and_increment(&message.message_id, &queue.name, now)
        .await
    {
        Ok(entry) => entry.retry_count,
        Err(error) => {
            // Fail open: the read above already decided whether to proceed;
            // if the write itself now fails, still enrich with the last
            // known (or zero) retry_count rather than lose the message.
            tracing::warn!(%error, message_id = %message.message_id, "ledger write failed, failing open");
            existing.map_or(0, |entry| entry.retry_count)
        }
    };

    let enriched = enrich(env, queue, &message, retry_count, now).await;
    publish_and_delete(env, queue, &message, enriched).await
}

/// Fail-open ledger read (§4.1, §9): any read error is treated as an
/// absent entry rather than blocking the message.
async fn lookup_ledger_fail_open(
    env: &Environment,
    message_id: &str,
    source_queue: &str,
) -> Option<LedgerEntry> {
    match env.ledger.get(message_id, source_queue).await {
        Ok(entry) => entry,
        Err(error) => {
            tracing::warn!(%error, message_id, source_queue, "ledger read failed, failing open");
            None
        }
    }
}

async fn drop_runaway(
    env: &Environment,
    queue: &QueueHandle,
    message: &ReceivedMessage,
) -> Disposition {
    if let Err(error) = env.queue.delete(queue, &message.receipt_token).await {
        tracing::error!(%error, message_id = %message.message_id, queue = %queue.name, "failed to delete runaway message");
        return Disposition::Failed;
    }
    metrics::counter!("monitor.messages.dropped_hard_cap").increment(1);
    Disposition::DroppedHardCap
}

async fn enrich(
    env: &Environment,
    queue: &QueueHandle,
    message: &ReceivedMessage,
    retry_count: u32,
    now: DateTime<Utc>,
) -> EnrichedMessage {
    let affected_service = derive_affected_service(&queue.name);

    let mut error_pattern = parse_error_pattern(&message.body);
    error_pattern.affected_service = affected_service.clone();

    let since = now - ChronoDuration::hours(1);
    let similar_failures_last_hour = match env
        .record_store
        .count_by_queue_since(&queue.name, since)
        .await
    {
        Ok(count) => count.saturating_sub(1),
        Err(error) => {
            tracing::warn!(%error, queue = %queue.name, "similar-failures query failed, using 0");
            0
        }
    };

    let recent_deployments = match env
        .deployment_store
        .recent_deployments(&affected_service, now, env.config.systemic_window_ms)
        .await
    {
        Ok(deployments) => deployments,
        Err(error) => {
            tracing::warn!(%error, service = %affected_service, "recent-deployments query failed, using none");
            Vec::new()
        }
    };

    EnrichedMessage {
        message_id: message.message_id.clone(),
        receipt_token: message.receipt_token.clone(),
        source_queue: queue.name.clone(),
        body: message.body.clone(),
        receive_count: message.receive_count,
        first_seen_at: now,
        last_failed_at: now,
        retry_count,
        similar_failures_last_hour,
        recent_deployments,
        error_pattern,
    }
}

async fn publish_and_delete(
    env: &Environment,
    queue: &QueueHandle,
    message: &ReceivedMessage,
    enriched: EnrichedMessage,
) -> Disposition {
    let data = match serde_json::to_vec(&enriched) {
        Ok(data) => data,
        Err(error) => {
            tracing::error!(%error, message_id = %enriched.message_id, "failed to serialize enriched message");
            return Disposition::Failed;
        }
    };

    let event = SerializedEvent::new(
        "MessageEnriched".to_string(),
        data,
        Some(serde_json::json!({ "source": "monitor" })),
    );

    // Delete only after the publish is durably accepted (§4.1 invariant 4).
    if let Err(error) = env.event_bus.publish(MESSAGE_ENRICHED_TOPIC, &event).await {
        tracing::error!(%error, message_id = %enriched.message_id, "publish failed, leaving message for redelivery");
        return Disposition::Failed;
    }

    if let Err(error) = env.queue.delete(queue, &message.receipt_token).await {
        tracing::error!(%error, message_id = %enriched.message_id, queue = %queue.name, "delete after publish failed");
        return Disposition::Failed;
    }

    metrics::counter!("monitor.messages.enriched").increment(1);
    Disposition::Enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlq_testing::{
        FixedClock, InMemoryDeploymentStore, InMemoryEventBus, InMemoryLedger,
        InMemoryQueueClient, InMemoryRecordStore,
    };

    fn env_with(
        queue: InMemoryQueueClient,
    ) -> (Environment, InMemoryQueueClient, Arc<InMemoryEventBus>, Arc<InMemoryLedger>) {
        let event_bus = Arc::new(InMemoryEventBus::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let env = Environment {
            queue: Arc::new(queue.clone()),
            ledger: ledger.clone(),
            record_store: Arc::new(InMemoryRecordStore::new()),
            deployment_store: Arc::new(InMemoryDeploymentStore::new()),
            event_bus: event_bus.clone(),
            clock: Arc::new(FixedClock::test_time()),
            config: MonitorConfig::default(),
        };
        (env, queue, event_bus, ledger)
    }

    #[tokio::test]
    async fn transient_message_is_enriched_published_and_deleted() {
        let queue = InMemoryQueueClient::new();
        queue.seed(
            "orders-dlq",
            dlq_core::queue::ReceivedMessage {
                message_id: "m1".to_string(),
                receipt_token: "r1".to_string(),
                body: br#"{"error":{"name":"NetworkError","message":"ETIMEDOUT: socket hang up"}}"#
                    .to_vec(),
                receive_count: 1,
            },
        );
        let (env, queue, _event_bus, ledger) = env_with(queue);

        let summary = run_tick(&env).await;

        assert_eq!(summary.queues_discovered, 1);
        assert_eq!(summary.messages_enriched, 1);
        assert_eq!(summary.messages_dropped_hard_cap, 0);
        assert_eq!(ledger.len(), 1);
        assert_eq!(queue.backlog_len("orders-dlq"), 0);
    }

    #[tokio::test]
    async fn hard_cap_drops_without_enrichment_or_publish() {
        let queue = InMemoryQueueClient::new();
        queue.seed(
            "orders-dlq",
            dlq_core::queue::ReceivedMessage {
                message_id: "m1".to_string(),
                receipt_token: "r1".to_string(),
                body: b"{}".to_vec(),
                receive_count: 1,
            },
        );
        let (env, queue, event_bus, ledger) = env_with(queue);

        let now = env.clock.now();
        // Drive the ledger to the hard cap (3) before this tick runs.
        for _ in 0..3 {
            ledger.upsert_and_increment("m1", "orders-dlq", now).await.unwrap();
        }

        let summary = run_tick(&env).await;

        assert_eq!(summary.messages_dropped_hard_cap, 1);
        assert_eq!(summary.messages_enriched, 0);
        assert_eq!(queue.backlog_len("orders-dlq"), 0);
        assert_eq!(event_bus.len(), 0);
    }

    #[tokio::test]
    async fn publish_failure_leaves_message_undeleted() {
        struct FailingEventBus;
        impl EventBus for FailingEventBus {
            fn publish(
                &self,
                _topic: &str,
                _event: &SerializedEvent,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = Result<(), dlq_core::event_bus::EventBusError>> + Send + '_>,
            > {
                Box::pin(async {
                    Err(dlq_core::event_bus::EventBusError::PublishFailed {
                        topic: "message-enriched".to_string(),
                        reason: "broker unavailable".to_string(),
                    })
                })
            }

            fn subscribe(
                &self,
                _topics: &[&str],
            ) -> std::pin::Pin<
                Box<
                    dyn std::future::Future<Output = Result<dlq_core::event_bus::EventStream, dlq_core::event_bus::EventBusError>>
                        + Send
                        + '_,
                >,
            > {
                Box::pin(async { Ok(Box::pin(futures::stream::empty()) as dlq_core::event_bus::EventStream) })
            }
        }

        let queue = InMemoryQueueClient::new();
        queue.seed(
            "orders-dlq",
            dlq_core::queue::ReceivedMessage {
                message_id: "m1".to_string(),
                receipt_token: "r1".to_string(),
                body: b"{}".to_vec(),
                receive_count: 1,
            },
        );
        let (mut env, queue, _event_bus, _ledger) = env_with(queue);
        env.event_bus = Arc::new(FailingEventBus);

        let summary = run_tick(&env).await;

        assert_eq!(summary.messages_failed, 1);
        assert_eq!(queue.backlog_len("orders-dlq"), 1);
    }

    #[tokio::test]
    async fn retry_count_increments_across_successive_ticks() {
        let queue = InMemoryQueueClient::new();
        let message = dlq_core::queue::ReceivedMessage {
            message_id: "m1".to_string(),
            receipt_token: "r1".to_string(),
            body: b"plain text failure".to_vec(),
            receive_count: 1,
        };
        queue.seed("orders-dlq", message.clone());
        let (env, queue, _event_bus, ledger) = env_with(queue);

        run_tick(&env).await;
        let after_first = ledger
            .get("m1", "orders-dlq")
            .await
            .unwrap()
            .expect("ledger entry exists after first tick");
        assert_eq!(after_first.retry_count, 0);

        // The message comes back to the DLQ on a later redelivery; the
        // Monitor must recognize it as the same (message_id, source_queue)
        // pair and bump the existing entry rather than starting over.
        queue.seed(
            "orders-dlq",
            dlq_core::queue::ReceivedMessage {
                receipt_token: "r2".to_string(),
                ..message
            },
        );
        run_tick(&env).await;
        let after_second = ledger
            .get("m1", "orders-dlq")
            .await
            .unwrap()
            .expect("ledger entry still exists after second tick");
        assert_eq!(after_second.retry_count, 1);
        assert!(after_second.last_seen_at >= after_first.last_seen_at);
    }
}
