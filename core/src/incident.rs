//! Incident-management client (§4.3 Escalate handler), PagerDuty-Events-API
//! shaped: a single "trigger" call returning a dedup key.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur while opening an incident.
#[derive(Error, Debug, Clone)]
pub enum IncidentError {
    /// The underlying HTTP call failed (network, timeout, non-2xx).
    #[error("incident client error: {0}")]
    RequestFailed(String),
}

/// A request to open (or dedup onto an existing) incident.
#[derive(Clone, Debug)]
pub struct IncidentRequest {
    /// Short human summary, e.g. "systemic failure in orders-service".
    pub summary: String,
    /// One of the severities the incident API accepts (§4.3: `severity`
    /// on [`crate::model::RecommendedAction::Escalate`]).
    pub severity: String,
    /// The originating message, for cross-referencing.
    pub message_id: String,
    /// The queue the message came from, included as a custom detail (§4.3).
    pub source_queue: String,
    /// The affected service, included as a custom detail (§4.3).
    pub affected_service: String,
    /// Source identifier for the incident event (§4.3, §6):
    /// `"<project>-dlq-<source_queue>"`, built by [`source_identifier`].
    pub source_identifier: String,
    /// The error type, included as a custom detail (§4.3).
    pub error_type: String,
    /// `similar_failures_last_hour` at classification time, included as a
    /// custom detail (§4.3).
    pub similar_failures_count: u32,
    /// Recent deployments, formatted for the custom-details blob (§4.3).
    pub recent_deployments: Vec<String>,
    /// `retry_count` at classification time, included as a custom detail (§4.3).
    pub retry_count: u32,
    /// The classification reasoning, included as incident detail.
    pub reasoning: String,
    /// The recommended action, included as a custom detail (§4.3).
    pub recommended_action: String,
    /// Deterministic dedup key: `"<project>-systemic-<source_queue>-<error_type>"` (§4.3, §6).
    pub dedup_key: String,
}

/// The incident API's acknowledgement.
#[derive(Clone, Debug)]
pub struct IncidentAck {
    /// The dedup/incident key returned by the API, stored on the
    /// classification record as `incident_key` (§3).
    pub incident_key: String,
}

/// Opens or dedups an incident against an external incident-management
/// system.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so this trait can be used
/// as `Arc<dyn IncidentClient>`.
pub trait IncidentClient: Send + Sync {
    /// Trigger (or dedup onto) an incident for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`IncidentError::RequestFailed`] on failure. Per §4.3,
    /// the Executor treats this as a failed Escalate attempt subject to
    /// its retry policy, not a terminal outcome.
    fn trigger(
        &self,
        request: IncidentRequest,
    ) -> Pin<Box<dyn Future<Output = Result<IncidentAck, IncidentError>> + Send + '_>>;
}

/// Build the deterministic incident dedup key (§4.3, §6):
/// `"<project>-systemic-<source_queue>-<error_type>"`.
#[must_use]
pub fn dedup_key(project: &str, source_queue: &str, error_type: &str) -> String {
    format!("{project}-systemic-{source_queue}-{error_type}")
}

/// Build the incident source identifier (§4.3, §6):
/// `"<project>-dlq-<source_queue>"`.
#[must_use]
pub fn source_identifier(project: &str, source_queue: &str) -> String {
    format!("{project}-dlq-{source_queue}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_expected_dedup_key() {
        assert_eq!(
            dedup_key("dlq", "orders-dlq", "NetworkError"),
            "dlq-systemic-orders-dlq-NetworkError"
        );
    }

    #[test]
    fn builds_expected_source_identifier() {
        assert_eq!(
            source_identifier("dlq", "orders-dlq"),
            "dlq-dlq-orders-dlq"
        );
    }
}
