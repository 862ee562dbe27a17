//! Analyzer component (§4.2): turn one enriched message into one
//! classification record and one `MessageClassified` event.
//!
//! The decision pipeline tries, in order, the semantic cache, the static
//! heuristic rule table (deployment correlation, then pattern match), the
//! LLM, and finally a conservative fallback. The first stage to produce a
//! classification wins; later stages never run.
//!
//! A [`Environment`] bundles every collaborator this component needs as a
//! trait object, so the same logic runs unchanged against the in-memory
//! fakes in `dlq-testing` or the Postgres/Redpanda/Anthropic-backed
//! implementations wired up by `dlq-service`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dlq_core::clock::Clock;
use dlq_core::config::AnalyzerConfig;
use dlq_core::error_patterns;
use dlq_core::event::SerializedEvent;
use dlq_core::event_bus::EventBus;
use dlq_core::feature_flags::FeatureFlags;
use dlq_core::fingerprint;
use dlq_core::llm::{ClassificationRequest, LlmClassifier};
use dlq_core::model::{
    Category, ClassificationRecord, DeploymentRef, EnrichedMessage, MessageClassifiedPayload,
    ModelTag, Outcome, RecommendedAction, SemanticCacheEntry, TokenUsage,
};
use dlq_core::record_store::RecordStore;
use dlq_core::redaction::redact;
use dlq_core::semantic_cache::SemanticCache;
use std::sync::Arc;

/// Topic the Analyzer publishes classified messages to (§6). The bus's
/// `detail_type` for each publish is the classified category's own
/// `TransientFailure`/`PoisonPillFailure`/`SystemicFailure` label (§4.2),
/// not this topic name.
pub const MESSAGE_CLASSIFIED_TOPIC: &str = "message-classified";

/// Every collaborator the Analyzer needs, bundled for a single invocation.
#[derive(Clone)]
pub struct Environment {
    /// The semantic cache, keyed by fingerprint.
    pub semantic_cache: Arc<dyn SemanticCache>,
    /// The classification record store.
    pub record_store: Arc<dyn RecordStore>,
    /// The LLM classifier, invoked only past a cache miss and no heuristic match.
    pub llm_classifier: Arc<dyn LlmClassifier>,
    /// The event bus `MessageClassified` is published to.
    pub event_bus: Arc<dyn EventBus>,
    /// Runtime toggles for the LLM-fallback path.
    pub feature_flags: Arc<dyn FeatureFlags>,
    /// Clock abstraction, so cache-TTL arithmetic is testable.
    pub clock: Arc<dyn Clock>,
    /// Analyzer-section configuration.
    pub config: AnalyzerConfig,
}

/// Outcome of classifying and publishing one enriched message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// A record was persisted and `MessageClassified` was published.
    Classified,
    /// Persistence or publish failed; the event will be retried by the bus.
    Failed,
}

/// Classify `message` and publish the resulting `MessageClassified` event
/// (§4.2). Re-running this over the same message produces an identical
/// record (modulo `timestamp`), since every stage is deterministic given
/// the same collaborator responses.
pub async fn classify_and_publish(env: &Environment, message: EnrichedMessage) -> Disposition {
    let now = env.clock.now();
    let hash = fingerprint::compute(&message.error_pattern);

    let classification = resolve_classification(env, &message, &hash, now).await;
    let recommended_action = recommended_action_for(env, classification.category, message.retry_count);
    let suspected_deployment = if classification.category == Category::Systemic {
        latest_deployment_version(&message.recent_deployments)
    } else {
        None
    };

    let record = build_record(
        &message,
        hash.clone(),
        &classification,
        recommended_action.clone(),
        suspected_deployment,
        now,
    );

    if classification.write_cache {
        let entry = SemanticCacheEntry {
            category: classification.category,
            confidence: classification.confidence,
            reasoning: classification.reasoning.clone(),
            recommended_action: recommended_action.clone(),
            cached_at: now,
        };
        if let Err(error) = env.semantic_cache.put(&hash, entry).await {
            tracing::warn!(%error, message_id = %message.message_id, "semantic cache write failed, continuing");
        }
    }

    if let Err(error) = env.record_store.put(record.clone()).await {
        tracing::error!(%error, message_id = %message.message_id, "record store write failed");
        return Disposition::Failed;
    }

    publish(env, &message, record).await
}

/// The outcome of resolving a category for one message, before the
/// recommended action or record are computed.
struct Classification {
    category: Category,
    confidence: f64,
    reasoning: String,
    model_tag: ModelTag,
    tokens: TokenUsage,
    /// Whether this result should be written to the semantic cache (§4.2
    /// Persistence: cache and LLM misses write through; cache hits and
    /// the conservative fallback do not).
    write_cache: bool,
}

async fn resolve_classification(
    env: &Environment,
    message: &EnrichedMessage,
    hash: &str,
    now: DateTime<Utc>,
) -> Classification {
    if let Some(cached) = try_cache(env, hash, now).await {
        metrics::counter!("analyzer.cache.hit").increment(1);
        return Classification {
            category: cached.category,
            confidence: cached.confidence,
            reasoning: cached.reasoning,
            model_tag: ModelTag::Cache,
            tokens: TokenUsage::default(),
            write_cache: false,
        };
    }

    if let Some(heuristic) = try_heuristics(env, message) {
        return Classification {
            category: heuristic.category,
            confidence: heuristic.confidence,
            reasoning: heuristic.reasoning,
            model_tag: ModelTag::Heuristic,
            tokens: TokenUsage::default(),
            write_cache: true,
        };
    }

    try_llm_or_fallback(env, message).await
}

/// Cache lookup with a caller-side TTL check (§4.2 step 2): the cache
/// trait itself does not filter by age, so a hit older than
/// `cache_ttl_hours` is treated the same as a miss. Read failures are
/// silently treated as misses.
async fn try_cache(env: &Environment, hash: &str, now: DateTime<Utc>) -> Option<SemanticCacheEntry> {
    match env.semantic_cache.get(hash).await {
        Ok(Some(entry)) => {
            let age = now - entry.cached_at;
            (age <= ChronoDuration::hours(env.config.cache_ttl_hours)).then_some(entry)
        }
        Ok(None) => None,
        Err(error) => {
            tracing::warn!(%error, hash, "semantic cache read failed, treating as miss");
            None
        }
    }
}

struct HeuristicMatch {
    category: Category,
    confidence: f64,
    reasoning: String,
}

/// Two-stage heuristic fast-path (§4.2 step 3): deployment correlation
/// first, then the static pattern-rule table.
fn try_heuristics(env: &Environment, message: &EnrichedMessage) -> Option<HeuristicMatch> {
    if message.similar_failures_last_hour >= env.config.systemic_min_similar
        && !message.recent_deployments.is_empty()
    {
        metrics::counter!("analyzer.heuristic.deployment_correlation").increment(1);
        return Some(HeuristicMatch {
            category: Category::Systemic,
            confidence: 0.92,
            reasoning: "spike correlated with recent deployment".to_string(),
        });
    }

    let rule = error_patterns::first_match(&message.error_pattern.message, env.config.confidence_threshold)?;
    metrics::counter!("analyzer.heuristic.pattern_match").increment(1);
    Some(HeuristicMatch {
        category: rule.category,
        confidence: rule.confidence,
        reasoning: rule.reasoning.to_string(),
    })
}

/// LLM classification, gated by the runtime feature flag (§6: "disabling
/// llm forces fallback path"); a call failure, timeout, or malformed
/// response all fall back the same way (§4.2 step 5).
async fn try_llm_or_fallback(env: &Environment, message: &EnrichedMessage) -> Classification {
    if !env.feature_flags.llm_classification_enabled() {
        return fallback_decision();
    }

    let request = build_llm_request(message);
    match env.llm_classifier.classify(request).await {
        Ok(response) => {
            metrics::counter!("analyzer.llm.classified").increment(1);
            Classification {
                category: response.category,
                confidence: response.confidence,
                reasoning: response.reasoning,
                model_tag: ModelTag::Llm(response.model),
                tokens: response.tokens,
                write_cache: true,
            }
        }
        Err(error) => {
            tracing::warn!(%error, message_id = %message.message_id, "llm classification failed, using conservative fallback");
            fallback_decision()
        }
    }
}

/// The conservative fallback (§4.2 step 5): classify SYSTEMIC at a fixed
/// confidence, never cached — caching a fallback result would suppress a
/// legitimate LLM retry for the cache's whole TTL window.
fn fallback_decision() -> Classification {
    metrics::counter!("analyzer.fallback.triggered").increment(1);
    Classification {
        category: Category::Systemic,
        confidence: 0.6,
        reasoning: "LLM classification failed, requires human review".to_string(),
        model_tag: ModelTag::Fallback,
        tokens: TokenUsage::default(),
        write_cache: false,
    }
}

/// Build the LLM request, redacting every free-text field (§4.2 step 4):
/// PII must never reach the model.
fn build_llm_request(message: &EnrichedMessage) -> ClassificationRequest {
    ClassificationRequest {
        error_type: redact(&message.error_pattern.error_type),
        message: redact(&message.error_pattern.message),
        stack_top: message
            .error_pattern
            .stack_top
            .iter()
            .flatten()
            .map(|frame| redact(frame))
            .collect(),
        code: message.error_pattern.code.clone(),
        affected_service: message.error_pattern.affected_service.clone(),
        source_queue: message.source_queue.clone(),
        retry_count: message.retry_count,
        similar_failures_last_hour: message.similar_failures_last_hour,
        recent_deployments: message
            .recent_deployments
            .iter()
            .map(|d| redact(&format!("{} by {}", d.version, d.author)))
            .collect(),
    }
}

/// The deterministic action mapping (§4.2 Recommended action): TRANSIENT
/// replays with backoff, POISON_PILL archives, SYSTEMIC always escalates
/// at severity `P1`.
fn recommended_action_for(env: &Environment, category: Category, retry_count: u32) -> RecommendedAction {
    match category {
        Category::Transient => RecommendedAction::Replay {
            retry_delay_s: u64::from(env.config.retry_delay_s(retry_count)),
            max_retries: 3,
        },
        Category::PoisonPill => RecommendedAction::Archive,
        Category::Systemic => RecommendedAction::Escalate { severity: "P1" },
    }
}

/// The most recent deployment's version, by `deployed_at` — the
/// `suspected_deployment` recorded when correlation fires (§3, §8 scenario 3).
fn latest_deployment_version(deployments: &[DeploymentRef]) -> Option<String> {
    deployments
        .iter()
        .max_by_key(|d| d.deployed_at)
        .map(|d| d.version.clone())
}

fn build_record(
    message: &EnrichedMessage,
    hash: String,
    classification: &Classification,
    recommended_action: RecommendedAction,
    suspected_deployment: Option<String>,
    now: DateTime<Utc>,
) -> ClassificationRecord {
    ClassificationRecord {
        message_id: message.message_id.clone(),
        timestamp: now,
        source_queue: message.source_queue.clone(),
        category: classification.category,
        confidence: classification.confidence,
        reasoning: classification.reasoning.clone(),
        model_tag: classification.model_tag.clone(),
        tokens: classification.tokens,
        recommended_action,
        action_taken: None,
        outcome: Outcome::Pending,
        retry_count: message.retry_count,
        retry_scheduled_for: None,
        archive_location: None,
        incident_key: None,
        suspected_deployment,
        similar_failures_count: message.similar_failures_last_hour,
        semantic_hash: hash,
        ttl_days: ClassificationRecord::TTL_DAYS,
    }
}

async fn publish(env: &Environment, message: &EnrichedMessage, record: ClassificationRecord) -> Disposition {
    let payload = MessageClassifiedPayload {
        message: message.clone(),
        classification: record.clone(),
    };
    let data = match serde_json::to_vec(&payload) {
        Ok(data) => data,
        Err(error) => {
            tracing::error!(%error, message_id = %message.message_id, "failed to serialize classified payload");
            return Disposition::Failed;
        }
    };

    let event = SerializedEvent::new(
        record.category.detail_type().to_string(),
        data,
        Some(serde_json::json!({ "source": "analyzer" })),
    );

    if let Err(error) = env.event_bus.publish(MESSAGE_CLASSIFIED_TOPIC, &event).await {
        tracing::error!(%error, message_id = %message.message_id, "publish failed");
        return Disposition::Failed;
    }

    metrics::counter!("analyzer.messages.classified").increment(1);
    Disposition::Classified
}
