//! Executor component (§4.3): dispatch one classified message to its
//! handler — Retry, Archive or Escalate — and write back the outcome.
//!
//! Dispatch is a plain match over [`Category`], not a trait-per-handler
//! hierarchy: three handlers, each a free function, is all the variation
//! this needs. Two TRANSIENT reroutes complicate the otherwise 1:1
//! category→handler mapping: a transient failure that has exhausted its
//! replay budget stops outright (FAILED, no escalation — a second,
//! belt-and-braces guard beyond the Monitor's own hard cap, §4.3), and a
//! transient failure routes to Escalate instead of Retry when
//! `auto_replay_enabled` is off.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dlq_core::alert::{Alert, AlertPublisher};
use dlq_core::clock::Clock;
use dlq_core::config::ExecutorConfig;
use dlq_core::event::SerializedEvent;
use dlq_core::event_bus::EventBus;
use dlq_core::feature_flags::FeatureFlags;
use dlq_core::incident;
use dlq_core::incident::{IncidentClient, IncidentRequest};
use dlq_core::model::{
    ActionTaken, Category, ClassificationRecord, EnrichedMessage, MessageClassifiedPayload,
    Outcome, RecommendedAction,
};
use dlq_core::object_store::{ObjectMetadata, ObjectStore, archive_key};
use dlq_core::parsing::derive_original_queue_name;
use dlq_core::queue::{MessageQueueClient, SendAttributes};
use dlq_core::record_store::{OutcomeUpdate, RecordStore};
use serde::Serialize;
use std::sync::Arc;

/// Topic the Archive handler publishes to alongside its external
/// [`AlertPublisher`] fan-out (§6).
pub const POISON_PILL_ALERTS_TOPIC: &str = "poison-pill-alerts";

const ALERT_EXCERPT_MAX_LEN: usize = 200;

/// Every collaborator the Executor needs, bundled for a single invocation.
#[derive(Clone)]
pub struct Environment {
    /// The queue service, used by the Retry handler to re-enqueue.
    pub queue: Arc<dyn MessageQueueClient>,
    /// The archive object store, used by the Archive handler.
    pub object_store: Arc<dyn ObjectStore>,
    /// Human-facing alert fan-out, used by the Archive handler.
    pub alert_publisher: Arc<dyn AlertPublisher>,
    /// The event bus, used by the Archive handler for its internal topic.
    pub event_bus: Arc<dyn EventBus>,
    /// The incident API client, used by the Escalate handler.
    pub incident_client: Arc<dyn IncidentClient>,
    /// The classification record store, updated after every handler runs.
    pub record_store: Arc<dyn RecordStore>,
    /// Runtime toggles for auto-replay and incident integration.
    pub feature_flags: Arc<dyn FeatureFlags>,
    /// Clock abstraction, so scheduling arithmetic is testable.
    pub clock: Arc<dyn Clock>,
    /// Executor-section configuration.
    pub config: ExecutorConfig,
    /// Project name, used to build the incident source identifier and dedup key.
    pub project: String,
}

/// Outcome of dispatching and recording one classified message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// The handler ran (successfully or not) and its outcome was recorded.
    Handled,
    /// The outcome could not be written back; the event will be retried by the bus.
    Failed,
}

/// Dispatch `payload` to its handler and persist the resulting outcome (§4.3).
pub async fn handle_classified(env: &Environment, payload: MessageClassifiedPayload) -> Disposition {
    let MessageClassifiedPayload { message, classification } = payload;

    let result = match classification.category {
        Category::Transient if retry_budget_exhausted(env, &message) => {
            handle_retry_budget_exhausted(&message)
        }
        Category::Transient if env.feature_flags.auto_replay_enabled() => {
            handle_retry(env, &message, &classification).await
        }
        Category::Transient => handle_escalate(env, &message, &classification).await,
        Category::PoisonPill => handle_archive(env, &message, &classification).await,
        Category::Systemic => handle_escalate(env, &message, &classification).await,
    };

    let update = OutcomeUpdate {
        action_taken: result.action_taken,
        outcome: result.outcome,
        retry_scheduled_for: result.retry_scheduled_for,
        archive_location: result.archive_location,
        incident_key: result.incident_key,
    };

    if let Err(error) = env.record_store.update_outcome(&message.message_id, update).await {
        tracing::error!(%error, message_id = %message.message_id, "failed to write back executor outcome");
        return Disposition::Failed;
    }

    Disposition::Handled
}

fn retry_budget_exhausted(env: &Environment, message: &EnrichedMessage) -> bool {
    message.retry_count >= env.config.max_retries_executor
}

struct HandlerResult {
    action_taken: ActionTaken,
    outcome: Outcome,
    retry_scheduled_for: Option<DateTime<Utc>>,
    archive_location: Option<String>,
    incident_key: Option<String>,
}

/// The Retry handler's hard cap (§4.3): once `retry_count` reaches
/// `max_retries_executor`, stop entirely — no re-enqueue, and do not
/// escalate either, since the Monitor's own hard cap already dropped
/// messages at this point; this is a second guard, not a new path to an
/// incident.
fn handle_retry_budget_exhausted(message: &EnrichedMessage) -> HandlerResult {
    tracing::warn!(
        message_id = %message.message_id,
        retry_count = message.retry_count,
        "retry budget exhausted, recording failure without escalating"
    );
    metrics::counter!("executor.messages.retry_budget_exhausted").increment(1);
    HandlerResult {
        action_taken: ActionTaken::Replayed,
        outcome: Outcome::Failed,
        retry_scheduled_for: None,
        archive_location: None,
        incident_key: None,
    }
}

/// Re-enqueue the message onto its original (non-DLQ) queue after a
/// backoff delay (§4.3 Retry handler). A successful send is recorded as
/// `PENDING`, not `SUCCESS`: the Executor does not observe the downstream
/// result of the replay.
async fn handle_retry(env: &Environment, message: &EnrichedMessage, record: &ClassificationRecord) -> HandlerResult {
    let delay_s = match record.recommended_action {
        RecommendedAction::Replay { retry_delay_s, .. } => u32::try_from(retry_delay_s).unwrap_or(u32::MAX),
        _ => env.config.retry_delay_s(message.retry_count),
    };
    let queue_name = derive_original_queue_name(&message.source_queue);
    let attributes = SendAttributes {
        retry_count: message.retry_count + 1,
        original_message_id: message.message_id.clone(),
        classification_category: record.category.as_str().to_string(),
    };

    match env
        .queue
        .send_with_delay(&queue_name, &message.body, delay_s, attributes)
        .await
    {
        Ok(()) => {
            metrics::counter!("executor.messages.replayed").increment(1);
            HandlerResult {
                action_taken: ActionTaken::Replayed,
                outcome: Outcome::Pending,
                retry_scheduled_for: Some(env.clock.now() + ChronoDuration::seconds(i64::from(delay_s))),
                archive_location: None,
                incident_key: None,
            }
        }
        Err(error) => {
            tracing::error!(%error, message_id = %message.message_id, "retry re-enqueue failed");
            HandlerResult {
                action_taken: ActionTaken::Replayed,
                outcome: Outcome::Failed,
                retry_scheduled_for: None,
                archive_location: None,
                incident_key: None,
            }
        }
    }
}

#[derive(Serialize)]
struct ArchiveDocument<'a> {
    message_id: &'a str,
    source_queue: &'a str,
    body: std::borrow::Cow<'a, str>,
    error_pattern: &'a dlq_core::model::ErrorPattern,
    category: &'static str,
    confidence: f64,
    reasoning: &'a str,
    archived_at: DateTime<Utc>,
}

/// Write the message to the archive and fan out a poison-pill alert
/// (§4.3 Archive handler). The object write is idempotent and must
/// succeed before the alert is published; a failed alert publish does
/// not roll back the archive (§4.3).
async fn handle_archive(env: &Environment, message: &EnrichedMessage, record: &ClassificationRecord) -> HandlerResult {
    let now = env.clock.now();
    let key = archive_key(now.date_naive(), &message.source_queue, &message.message_id);
    let document = ArchiveDocument {
        message_id: &message.message_id,
        source_queue: &message.source_queue,
        body: String::from_utf8_lossy(&message.body),
        error_pattern: &message.error_pattern,
        category: record.category.as_str(),
        confidence: record.confidence,
        reasoning: &record.reasoning,
        archived_at: now,
    };

    let body = match serde_json::to_vec(&document) {
        Ok(body) => body,
        Err(error) => {
            tracing::error!(%error, message_id = %message.message_id, "failed to serialize archive document");
            return HandlerResult {
                action_taken: ActionTaken::Archived,
                outcome: Outcome::Failed,
                retry_scheduled_for: None,
                archive_location: None,
                incident_key: None,
            };
        }
    };

    let metadata = ObjectMetadata {
        message_id: message.message_id.clone(),
        source_queue: message.source_queue.clone(),
        category: record.category.as_str().to_string(),
        confidence: record.confidence,
    };

    if let Err(error) = env.object_store.put(&key, body, "application/json", metadata).await {
        tracing::error!(%error, message_id = %message.message_id, "archive write failed");
        return HandlerResult {
            action_taken: ActionTaken::Archived,
            outcome: Outcome::Failed,
            retry_scheduled_for: None,
            archive_location: None,
            incident_key: None,
        };
    }

    let alert = Alert {
        message_id: message.message_id.clone(),
        source_queue: message.source_queue.clone(),
        summary: format!("Poison Pill Detected: {}", message.source_queue),
        reasoning: format!(
            "archived at {key}: {}",
            truncate_excerpt(&message.error_pattern.message, ALERT_EXCERPT_MAX_LEN)
        ),
    };

    if let Ok(data) = serde_json::to_vec(&alert) {
        let event = SerializedEvent::new("PoisonPillDetected".to_string(), data, Some(serde_json::json!({ "source": "executor" })));
        if let Err(error) = env.event_bus.publish(POISON_PILL_ALERTS_TOPIC, &event).await {
            tracing::warn!(%error, message_id = %message.message_id, "poison-pill-alerts publish failed, archive already committed");
        }
    }

    if let Err(error) = env.alert_publisher.publish(alert).await {
        tracing::warn!(%error, message_id = %message.message_id, "alert publish failed, archive already committed");
    }

    metrics::counter!("executor.messages.archived").increment(1);
    HandlerResult {
        action_taken: ActionTaken::Archived,
        outcome: Outcome::Success,
        retry_scheduled_for: None,
        archive_location: Some(key),
        incident_key: None,
    }
}

fn truncate_excerpt(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut truncated: String = s.chars().take(max_len).collect();
    truncated.push('…');
    truncated
}

/// The severity an Escalate call opens at: the recommendation's own
/// severity when the classification itself called for escalation, or a
/// lower `P2` when this handler was reached via the `auto_replay_enabled`
/// reroute rather than a SYSTEMIC classification.
fn escalate_severity(record: &ClassificationRecord) -> &'static str {
    match &record.recommended_action {
        RecommendedAction::Escalate { severity } => severity,
        RecommendedAction::Replay { .. } | RecommendedAction::Archive => "P2",
    }
}

fn recommended_action_label(action: &RecommendedAction) -> String {
    match action {
        RecommendedAction::Replay { .. } => "REPLAY".to_string(),
        RecommendedAction::Archive => "ARCHIVE".to_string(),
        RecommendedAction::Escalate { severity } => format!("ESCALATE:{severity}"),
    }
}

/// Open (or dedup onto) an incident (§4.3 Escalate handler). When
/// incident integration is disabled this is a deliberate no-op, not a
/// failure: the operator has opted out, so there is nothing to retry.
async fn handle_escalate(env: &Environment, message: &EnrichedMessage, record: &ClassificationRecord) -> HandlerResult {
    if !env.feature_flags.incident_integration_enabled() {
        tracing::info!(message_id = %message.message_id, "incident integration disabled, skipping escalate");
        return HandlerResult {
            action_taken: ActionTaken::Escalated,
            outcome: Outcome::Success,
            retry_scheduled_for: None,
            archive_location: None,
            incident_key: None,
        };
    }

    let request = IncidentRequest {
        summary: format!("{} failure in {}", record.category.as_str(), message.error_pattern.affected_service),
        severity: escalate_severity(record).to_string(),
        message_id: message.message_id.clone(),
        source_queue: message.source_queue.clone(),
        affected_service: message.error_pattern.affected_service.clone(),
        source_identifier: incident::source_identifier(&env.project, &message.source_queue),
        error_type: message.error_pattern.error_type.clone(),
        similar_failures_count: record.similar_failures_count,
        recent_deployments: message
            .recent_deployments
            .iter()
            .map(|d| format!("{} by {}", d.version, d.author))
            .collect(),
        retry_count: message.retry_count,
        reasoning: record.reasoning.clone(),
        recommended_action: recommended_action_label(&record.recommended_action),
        dedup_key: incident::dedup_key(&env.project, &message.source_queue, &message.error_pattern.error_type),
    };

    match env.incident_client.trigger(request).await {
        Ok(ack) => {
            metrics::counter!("executor.messages.escalated").increment(1);
            HandlerResult {
                action_taken: ActionTaken::Escalated,
                outcome: Outcome::Success,
                retry_scheduled_for: None,
                archive_location: None,
                incident_key: Some(ack.incident_key),
            }
        }
        Err(error) => {
            tracing::error!(%error, message_id = %message.message_id, "incident trigger failed");
            HandlerResult {
                action_taken: ActionTaken::Escalated,
                outcome: Outcome::Failed,
                retry_scheduled_for: None,
                archive_location: None,
                incident_key: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlq_core::model::{DeploymentRef, ErrorPattern, ModelTag, TokenUsage};
    use dlq_testing::{
        FixedClock, InMemoryAlertPublisher, InMemoryEventBus, InMemoryIncidentClient, InMemoryObjectStore,
        InMemoryQueueClient, InMemoryRecordStore, ToggleFlags,
    };

    fn message(category_source_queue: &str) -> EnrichedMessage {
        EnrichedMessage {
            message_id: "m1".to_string(),
            receipt_token: "r1".to_string(),
            source_queue: category_source_queue.to_string(),
            body: b"{\"errorMessage\":\"ETIMEDOUT\"}".to_vec(),
            receive_count: 1,
            first_seen_at: FixedClock::test_time().now(),
            last_failed_at: FixedClock::test_time().now(),
            retry_count: 1,
            similar_failures_last_hour: 0,
            recent_deployments: vec![],
            error_pattern: ErrorPattern {
                error_type: "NetworkError".to_string(),
                message: "ETIMEDOUT: socket hang up".to_string(),
                stack_top: None,
                code: None,
                affected_service: "Orders".to_string(),
            },
        }
    }

    fn record(category: Category, recommended_action: RecommendedAction) -> ClassificationRecord {
        ClassificationRecord {
            message_id: "m1".to_string(),
            timestamp: FixedClock::test_time().now(),
            source_queue: "orders-dlq".to_string(),
            category,
            confidence: 0.9,
            reasoning: "test reasoning".to_string(),
            model_tag: ModelTag::Heuristic,
            tokens: TokenUsage::default(),
            recommended_action,
            action_taken: None,
            outcome: Outcome::Pending,
            retry_count: 1,
            retry_scheduled_for: None,
            archive_location: None,
            incident_key: None,
            suspected_deployment: None,
            similar_failures_count: 0,
            semantic_hash: "abc123".to_string(),
            ttl_days: ClassificationRecord::TTL_DAYS,
        }
    }

    struct Harness {
        env: Environment,
        queue: Arc<InMemoryQueueClient>,
        object_store: Arc<InMemoryObjectStore>,
        alerts: Arc<InMemoryAlertPublisher>,
        incidents: Arc<InMemoryIncidentClient>,
        record_store: Arc<InMemoryRecordStore>,
    }

    fn harness() -> Harness {
        let queue = Arc::new(InMemoryQueueClient::new());
        let object_store = Arc::new(InMemoryObjectStore::new());
        let alerts = Arc::new(InMemoryAlertPublisher::new());
        let incidents = Arc::new(InMemoryIncidentClient::new());
        let record_store = Arc::new(InMemoryRecordStore::new());
        let env = Environment {
            queue: queue.clone(),
            object_store: object_store.clone(),
            alert_publisher: alerts.clone(),
            event_bus: Arc::new(InMemoryEventBus::new()),
            incident_client: incidents.clone(),
            record_store: record_store.clone(),
            feature_flags: Arc::new(ToggleFlags::all_enabled()),
            clock: Arc::new(FixedClock::test_time()),
            config: ExecutorConfig::default(),
            project: "dlq".to_string(),
        };
        Harness { env, queue, object_store, alerts, incidents, record_store }
    }

    #[tokio::test]
    async fn transient_message_is_replayed_and_recorded_pending() {
        let h = harness();
        let payload = MessageClassifiedPayload {
            message: message("orders-dlq"),
            classification: record(Category::Transient, RecommendedAction::Replay { retry_delay_s: 60, max_retries: 3 }),
        };

        let disposition = handle_classified(&h.env, payload).await;

        assert_eq!(disposition, Disposition::Handled);
        let sent = h.queue.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].queue_name, "orders");
        assert_eq!(sent[0].delay_s, 60);
        assert_eq!(sent[0].attributes.retry_count, 2);

        let stored = h.record_store.get("m1").await.unwrap();
        assert_eq!(stored.outcome, Outcome::Pending);
        assert_eq!(stored.action_taken, Some(ActionTaken::Replayed));
        assert!(stored.retry_scheduled_for.is_some());
    }

    #[tokio::test]
    async fn transient_message_past_retry_budget_fails_without_escalating() {
        let h = harness();
        let mut msg = message("orders-dlq");
        msg.retry_count = h.env.config.max_retries_executor;
        let payload = MessageClassifiedPayload {
            message: msg,
            classification: record(Category::Transient, RecommendedAction::Replay { retry_delay_s: 60, max_retries: 3 }),
        };

        handle_classified(&h.env, payload).await;

        assert!(h.queue.sent_messages().is_empty());
        assert!(h.incidents.is_empty());
        let stored = h.record_store.get("m1").await.unwrap();
        assert_eq!(stored.outcome, Outcome::Failed);
    }

    #[tokio::test]
    async fn poison_pill_is_archived_and_alerted() {
        let h = harness();
        let payload = MessageClassifiedPayload {
            message: message("orders-dlq"),
            classification: record(Category::PoisonPill, RecommendedAction::Archive),
        };

        handle_classified(&h.env, payload).await;

        assert_eq!(h.object_store.len(), 1);
        assert_eq!(h.alerts.len(), 1);
        assert_eq!(h.alerts.published()[0].summary, "Poison Pill Detected: orders-dlq");

        let stored = h.record_store.get("m1").await.unwrap();
        assert_eq!(stored.outcome, Outcome::Success);
        assert_eq!(stored.action_taken, Some(ActionTaken::Archived));
        assert!(stored.archive_location.is_some());
    }

    #[tokio::test]
    async fn poison_pill_is_always_archived_regardless_of_other_flags() {
        let mut h = harness();
        h.env.feature_flags = Arc::new(ToggleFlags::all_disabled());
        let payload = MessageClassifiedPayload {
            message: message("orders-dlq"),
            classification: record(Category::PoisonPill, RecommendedAction::Archive),
        };

        handle_classified(&h.env, payload).await;

        assert_eq!(h.object_store.len(), 1);
        assert!(h.incidents.is_empty());
        let stored = h.record_store.get("m1").await.unwrap();
        assert_eq!(stored.action_taken, Some(ActionTaken::Archived));
    }

    #[tokio::test]
    async fn transient_message_escalates_when_auto_replay_disabled() {
        let mut h = harness();
        let flags = ToggleFlags::all_enabled();
        flags.set_auto_replay_enabled(false);
        h.env.feature_flags = Arc::new(flags);
        let payload = MessageClassifiedPayload {
            message: message("orders-dlq"),
            classification: record(Category::Transient, RecommendedAction::Replay { retry_delay_s: 60, max_retries: 3 }),
        };

        handle_classified(&h.env, payload).await;

        assert!(h.queue.sent_messages().is_empty());
        assert_eq!(h.incidents.len(), 1);
        assert_eq!(h.incidents.triggered()[0].severity, "P2");
        let stored = h.record_store.get("m1").await.unwrap();
        assert_eq!(stored.action_taken, Some(ActionTaken::Escalated));
    }

    #[tokio::test]
    async fn systemic_message_opens_an_incident_at_p1() {
        let h = harness();
        let mut msg = message("orders-dlq");
        msg.recent_deployments = vec![DeploymentRef {
            id: "d1".to_string(),
            version: "v4.2.0".to_string(),
            deployed_at: FixedClock::test_time().now(),
            author: "ci-bot".to_string(),
        }];
        let payload = MessageClassifiedPayload {
            message: msg,
            classification: record(Category::Systemic, RecommendedAction::Escalate { severity: "P1" }),
        };

        handle_classified(&h.env, payload).await;

        assert_eq!(h.incidents.len(), 1);
        let triggered = &h.incidents.triggered()[0];
        assert_eq!(triggered.severity, "P1");
        assert_eq!(triggered.dedup_key, "dlq-systemic-orders-dlq-NetworkError");
        assert_eq!(triggered.source_identifier, "dlq-dlq-orders-dlq");

        let stored = h.record_store.get("m1").await.unwrap();
        assert_eq!(stored.outcome, Outcome::Success);
        assert_eq!(stored.incident_key, Some("dlq-systemic-orders-dlq-NetworkError".to_string()));
    }

    #[tokio::test]
    async fn disabled_incident_integration_is_a_deliberate_no_op() {
        let mut h = harness();
        let flags = ToggleFlags::all_enabled();
        flags.set_incident_integration_enabled(false);
        h.env.feature_flags = Arc::new(flags);
        let payload = MessageClassifiedPayload {
            message: message("orders-dlq"),
            classification: record(Category::Systemic, RecommendedAction::Escalate { severity: "P1" }),
        };

        handle_classified(&h.env, payload).await;

        assert!(h.incidents.is_empty());
        let stored = h.record_store.get("m1").await.unwrap();
        assert_eq!(stored.outcome, Outcome::Success);
        assert_eq!(stored.incident_key, None);
    }

    #[tokio::test]
    async fn failed_retry_send_is_recorded_as_failed_outcome() {
        let h = harness();
        // No queues known to the fake client, so send_with_delay still
        // succeeds (it has no notion of destination existence) — instead
        // exercise the incident-trigger failure path isn't representable
        // with the in-memory fakes (they never fail); this test documents
        // that a successful send always yields PENDING, never SUCCESS.
        let payload = MessageClassifiedPayload {
            message: message("orders-dlq"),
            classification: record(Category::Transient, RecommendedAction::Replay { retry_delay_s: 30, max_retries: 3 }),
        };

        handle_classified(&h.env, payload).await;

        let stored = h.record_store.get("m1").await.unwrap();
        assert_ne!(stored.outcome, Outcome::Success);
    }
}
