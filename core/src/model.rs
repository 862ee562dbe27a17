//! Data model shared by the Monitor, Analyzer and Executor.
//!
//! These types cross component boundaries on the event bus or through the
//! record store, so they derive `Serialize`/`Deserialize` and avoid
//! borrowing: every field is owned data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single deployment observed in the window leading up to a failure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRef {
    /// Opaque deployment identifier.
    pub id: String,
    /// Version or revision label (e.g. a git SHA or semver tag).
    pub version: String,
    /// When the deployment completed.
    pub deployed_at: DateTime<Utc>,
    /// Who or what triggered the deployment.
    pub author: String,
}

/// The error identity extracted from a message body.
///
/// `message` and `stack_top` are already truncated by the time this type is
/// constructed; see `dlq_core::parsing`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorPattern {
    /// Error type/name, e.g. `"NetworkError"` or `"ParseError"`.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Human-readable message, truncated to 500 chars with an ellipsis marker.
    pub message: String,
    /// Up to 3 stack frames plus the error line, if one was present.
    pub stack_top: Option<Vec<String>>,
    /// Error code, if the body carried one (e.g. an HTTP status or app code).
    pub code: Option<String>,
    /// Service the error is attributed to, derived from the source queue name.
    pub affected_service: String,
}

/// A DLQ message after Monitor enrichment, ready for classification.
///
/// This is the payload of the `MessageEnriched` event (§6).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrichedMessage {
    /// Unique identifier within `source_queue`.
    pub message_id: String,
    /// Opaque token used to delete the message from its source queue.
    pub receipt_token: String,
    /// Name of the queue the message was received from.
    pub source_queue: String,
    /// Raw message body; opaque to everything except the error-pattern parser.
    pub body: Vec<u8>,
    /// Number of times the underlying queue service has redelivered this message.
    pub receive_count: u32,
    /// When this message was first observed by the Monitor.
    pub first_seen_at: DateTime<Utc>,
    /// When this message most recently failed (i.e. landed in the DLQ).
    pub last_failed_at: DateTime<Utc>,
    /// Monotonically increasing count of Monitor observations for this message.
    pub retry_count: u32,
    /// Count of other classified records on the same queue in the last hour.
    pub similar_failures_last_hour: u32,
    /// Deployments observed in the 15 minutes before `last_failed_at`.
    pub recent_deployments: Vec<DeploymentRef>,
    /// The parsed error identity.
    pub error_pattern: ErrorPattern,
}

/// The three outcomes a classification can reach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Likely to succeed if replayed after a short backoff.
    Transient,
    /// Intrinsically unprocessable; retries cannot succeed.
    PoisonPill,
    /// External cause affecting many messages at once.
    Systemic,
}

impl Category {
    /// Stable string form used in persisted records and log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "TRANSIENT",
            Self::PoisonPill => "POISON_PILL",
            Self::Systemic => "SYSTEMIC",
        }
    }

    /// Parse the stable string form.
    ///
    /// # Errors
    ///
    /// Returns `None` if `s` is not one of the three known categories.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TRANSIENT" => Some(Self::Transient),
            "POISON_PILL" => Some(Self::PoisonPill),
            "SYSTEMIC" => Some(Self::Systemic),
            _ => None,
        }
    }

    /// The `detail_type` used when publishing `MessageClassified` (§4.2).
    #[must_use]
    pub const fn detail_type(self) -> &'static str {
        match self {
            Self::Transient => "TransientFailure",
            Self::PoisonPill => "PoisonPillFailure",
            Self::Systemic => "SystemicFailure",
        }
    }
}

/// Which layer of the decision pipeline produced a classification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ModelTag {
    /// Matched the static heuristic rule table.
    Heuristic,
    /// Served from the semantic cache.
    Cache,
    /// The LLM call failed, timed out, or returned invalid output.
    Fallback,
    /// Classified by the named LLM model.
    Llm(String),
}

impl ModelTag {
    /// Stable string form for persistence and log fields.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Heuristic => "heuristic",
            Self::Cache => "cache",
            Self::Fallback => "fallback",
            Self::Llm(model) => model,
        }
    }
}

/// Input/output token counts for an LLM classification call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub input: u32,
    /// Tokens produced in the completion.
    pub output: u32,
}

/// Which action was actually dispatched by the Executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionTaken {
    /// The message was re-enqueued to its original queue.
    Replayed,
    /// The message was written to the archive and an alert was published.
    Archived,
    /// An incident was opened against the incident API.
    Escalated,
}

impl ActionTaken {
    /// Stable string form for persistence and log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Replayed => "REPLAYED",
            Self::Archived => "ARCHIVED",
            Self::Escalated => "ESCALATED",
        }
    }
}

/// Outcome of the Executor's handler for a classification record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Written but not yet resolved (e.g. a replay whose downstream result
    /// is not directly observed).
    Pending,
    /// The handler's side effect completed successfully.
    Success,
    /// The handler's side effect failed and the event will be retried by the bus.
    Failed,
}

impl Outcome {
    /// Stable string form for persistence and log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

/// The recommended action computed deterministically from `Category` (§4.2).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RecommendedAction {
    /// Replay the message after `retry_delay_s`, up to `max_retries` total attempts.
    Replay {
        /// Seconds to wait before re-enqueueing.
        retry_delay_s: u64,
        /// Maximum number of replay attempts the Executor will honor.
        max_retries: u32,
    },
    /// Archive the message; always requires human review.
    Archive,
    /// Open an incident at the given severity; always requires human review.
    Escalate {
        /// Incident severity, one of `"P1"`, `"P2"`, `"P3"`.
        severity: &'static str,
    },
}

impl RecommendedAction {
    /// Whether this recommendation calls for a human to look at the record.
    #[must_use]
    pub const fn requires_human_review(&self) -> bool {
        !matches!(self, Self::Replay { .. })
    }
}

/// A classification outcome for one message, keyed by `message_id` (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassificationRecord {
    /// The message this record classifies.
    pub message_id: String,
    /// When the record was written.
    pub timestamp: DateTime<Utc>,
    /// The queue the message came from.
    pub source_queue: String,
    /// The classification category.
    pub category: Category,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Short human-readable rationale.
    pub reasoning: String,
    /// Which layer of the decision pipeline produced this record.
    pub model_tag: ModelTag,
    /// Token usage if an LLM call was made; zeroed otherwise.
    pub tokens: TokenUsage,
    /// The recommended action, computed from `category`.
    pub recommended_action: RecommendedAction,
    /// The action the Executor actually dispatched, once it has run.
    pub action_taken: Option<ActionTaken>,
    /// The current outcome of that action.
    pub outcome: Outcome,
    /// Retry count at classification time (copied from the enriched message).
    pub retry_count: u32,
    /// When a scheduled replay is due, if `action_taken == Replayed`.
    pub retry_scheduled_for: Option<DateTime<Utc>>,
    /// Archive object key, if `action_taken == Archived`.
    pub archive_location: Option<String>,
    /// Incident dedup key, if `action_taken == Escalated`.
    pub incident_key: Option<String>,
    /// Deployment suspected to have caused the failure, if correlation fired.
    pub suspected_deployment: Option<String>,
    /// `similar_failures_last_hour` at classification time.
    pub similar_failures_count: u32,
    /// The 16-hex-char semantic fingerprint.
    pub semantic_hash: String,
    /// Time-to-live in days (always 30, per §3).
    pub ttl_days: u32,
}

impl ClassificationRecord {
    /// Record TTL per §3: 30 days.
    pub const TTL_DAYS: u32 = 30;
}

/// A deduplication ledger entry for one `(message_id, source_queue)` pair (§3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// The message this entry tracks.
    pub message_id: String,
    /// The queue the message belongs to.
    pub source_queue: String,
    /// When the Monitor first observed this message.
    pub first_seen_at: DateTime<Utc>,
    /// When the Monitor most recently observed this message.
    pub last_seen_at: DateTime<Utc>,
    /// Monotonically non-decreasing retry counter.
    pub retry_count: u32,
}

impl LedgerEntry {
    /// Ledger TTL per §3: 7 days.
    pub const TTL_DAYS: u32 = 7;
}

/// A cached classification result, keyed by semantic fingerprint (§3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticCacheEntry {
    /// The category that was classified.
    pub category: Category,
    /// The confidence that was recorded.
    pub confidence: f64,
    /// The original rationale (preserved verbatim on cache hits, §3 invariant 5).
    pub reasoning: String,
    /// The recommended action associated with `category`.
    pub recommended_action: RecommendedAction,
    /// When this entry was written.
    pub cached_at: DateTime<Utc>,
}

impl SemanticCacheEntry {
    /// Cache TTL per §3: 1 hour.
    pub const TTL_HOURS: i64 = 1;
}

/// The payload of a `MessageClassified` event (§4.2, §6): the enriched
/// message the Analyzer classified, paired with the record it produced.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageClassifiedPayload {
    /// The message that was classified.
    pub message: EnrichedMessage,
    /// The classification record produced for it.
    pub classification: ClassificationRecord,
}
