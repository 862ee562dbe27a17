//! External-notification collaborators for the Executor: a
//! PagerDuty-Events-API-shaped [`IncidentClient`] for the Escalate handler
//! (§4.3), and a Slack-webhook-shaped
//! [`AlertPublisher`](dlq_core::alert::AlertPublisher) for poison-pill and
//! archive notices (§4.2, §4.3). Both are plain HTTP calls, so they live
//! in one crate alongside `reqwest`.
//!
//! [`PagerDutyIncidentClient`] sends a `trigger` event to the
//! [Events API v2][events-api], routed by `routing_key` (the PagerDuty
//! integration key) and deduplicated by `dedup_key` — repeated triggers
//! with the same key update the existing incident instead of opening a
//! new one, which is exactly the dedup semantics
//! `dlq_core::incident::dedup_key` is built for.
//!
//! [events-api]: https://developer.pagerduty.com/docs/events-api-v2/trigger-events/

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod slack;

pub use slack::SlackAlertPublisher;

use dlq_core::incident::{IncidentAck, IncidentClient, IncidentError, IncidentRequest};
use dlq_resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use dlq_resilience::metrics::{CircuitBreakerMetrics, RetryMetrics};
use dlq_resilience::retry::{retry_with_backoff, RetryPolicy};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

const EVENTS_API_URL: &str = "https://events.pagerduty.com/v2/enqueue";
const BREAKER_NAME: &str = "pagerduty-incident";
const RETRY_OPERATION: &str = "incident.trigger";

/// PagerDuty Events-API-backed [`IncidentClient`].
#[derive(Clone)]
pub struct PagerDutyIncidentClient {
    client: Client,
    routing_key: String,
    api_url: String,
    retry_policy: RetryPolicy,
    breaker: CircuitBreaker,
}

impl PagerDutyIncidentClient {
    /// Build a client for the given PagerDuty integration (routing) key.
    ///
    /// A failed trigger is retried twice with a short backoff before giving
    /// up, and calls go through a circuit breaker with the library default
    /// configuration; use [`with_retry_policy`](Self::with_retry_policy) and
    /// [`with_circuit_breaker`](Self::with_circuit_breaker) to override
    /// either.
    #[must_use]
    pub fn new(routing_key: String) -> Self {
        Self {
            client: Client::new(),
            routing_key,
            api_url: EVENTS_API_URL.to_string(),
            retry_policy: RetryPolicy::builder()
                .max_retries(2)
                .initial_delay(Duration::from_millis(200))
                .max_delay(Duration::from_secs(5))
                .multiplier(2.0)
                .build(),
            breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
        }
    }

    /// Replace the retry policy applied to a failed trigger.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Replace the circuit breaker guarding calls to the Events API.
    #[must_use]
    pub fn with_circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = breaker;
        self
    }

    /// Read the routing key from `PAGERDUTY_ROUTING_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`IncidentError::RequestFailed`] if the variable is unset.
    pub fn from_env() -> Result<Self, IncidentError> {
        let routing_key = std::env::var("PAGERDUTY_ROUTING_KEY")
            .map_err(|_| IncidentError::RequestFailed("PAGERDUTY_ROUTING_KEY not set".to_string()))?;
        Ok(Self::new(routing_key))
    }

    #[cfg(test)]
    #[must_use]
    fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

impl PagerDutyIncidentClient {
    /// One attempt at sending `body` to the Events API, with no retry.
    async fn send_once(&self, body: &EventsApiRequest, severity: &str) -> Result<IncidentAck, IncidentError> {
        let response = self
            .client
            .post(&self.api_url)
            .json(body)
            .send()
            .await
            .map_err(|e| IncidentError::RequestFailed(e.to_string()))?;

        match response.status() {
            StatusCode::OK | StatusCode::ACCEPTED => {
                let ack: EventsApiResponse = response
                    .json()
                    .await
                    .map_err(|e| IncidentError::RequestFailed(e.to_string()))?;
                tracing::info!(
                    incident_key = %ack.dedup_key,
                    severity = %severity,
                    "incident triggered"
                );
                metrics::counter!("executor.incident.triggered").increment(1);
                Ok(IncidentAck {
                    incident_key: ack.dedup_key,
                })
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(IncidentError::RequestFailed(format!(
                    "pagerduty returned {status}: {text}"
                )))
            }
        }
    }
}

impl IncidentClient for PagerDutyIncidentClient {
    fn trigger(
        &self,
        request: IncidentRequest,
    ) -> Pin<Box<dyn Future<Output = Result<IncidentAck, IncidentError>> + Send + '_>> {
        Box::pin(async move {
            let body = EventsApiRequest::from_incident_request(&self.routing_key, &request);

            CircuitBreakerMetrics::record_call(BREAKER_NAME);
            let outcome = self
                .breaker
                .call(|| {
                    retry_with_backoff(self.retry_policy.clone(), || {
                        RetryMetrics::record_attempt(RETRY_OPERATION);
                        self.send_once(&body, &request.severity)
                    })
                })
                .await;

            match outcome {
                Ok(ack) => {
                    CircuitBreakerMetrics::record_success(BREAKER_NAME);
                    RetryMetrics::record_success(RETRY_OPERATION);
                    Ok(ack)
                }
                Err(CircuitBreakerError::Open) => {
                    CircuitBreakerMetrics::record_rejection(BREAKER_NAME);
                    Err(IncidentError::RequestFailed("circuit breaker open".to_string()))
                }
                Err(CircuitBreakerError::Inner(e)) => {
                    CircuitBreakerMetrics::record_failure(BREAKER_NAME);
                    RetryMetrics::record_exhausted(RETRY_OPERATION);
                    Err(e)
                }
            }
        })
    }
}

#[derive(Serialize)]
struct EventsApiRequest {
    routing_key: String,
    event_action: &'static str,
    dedup_key: String,
    payload: EventsApiPayload,
}

#[derive(Serialize)]
struct EventsApiPayload {
    summary: String,
    source: String,
    severity: String,
    custom_details: EventsApiDetails,
}

#[derive(Serialize)]
struct EventsApiDetails {
    message_id: String,
    source_queue: String,
    error_type: String,
    similar_failures_count: u32,
    recent_deployments: Vec<String>,
    retry_count: u32,
    reasoning: String,
    recommended_action: String,
}

impl EventsApiRequest {
    fn from_incident_request(routing_key: &str, request: &IncidentRequest) -> Self {
        Self {
            routing_key: routing_key.to_string(),
            event_action: "trigger",
            dedup_key: request.dedup_key.clone(),
            payload: EventsApiPayload {
                summary: request.summary.clone(),
                source: request.source_identifier.clone(),
                severity: pagerduty_severity(&request.severity),
                custom_details: EventsApiDetails {
                    message_id: request.message_id.clone(),
                    source_queue: request.source_queue.clone(),
                    error_type: request.error_type.clone(),
                    similar_failures_count: request.similar_failures_count,
                    recent_deployments: request.recent_deployments.clone(),
                    retry_count: request.retry_count,
                    reasoning: request.reasoning.clone(),
                    recommended_action: request.recommended_action.clone(),
                },
            },
        }
    }
}

#[derive(Deserialize)]
struct EventsApiResponse {
    dedup_key: String,
}

/// Map the pipeline's `"P1"`/`"P2"`/`"P3"` severities onto PagerDuty's
/// `critical`/`error`/`warning`/`info` scale.
fn pagerduty_severity(severity: &str) -> String {
    match severity {
        "P1" => "critical",
        "P2" => "error",
        "P3" => "warning",
        _ => "info",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> IncidentRequest {
        IncidentRequest {
            summary: "systemic failure in orders-service".to_string(),
            severity: "P2".to_string(),
            message_id: "m1".to_string(),
            source_queue: "orders-dlq".to_string(),
            affected_service: "orders-service".to_string(),
            source_identifier: "dlq-dlq-orders-dlq".to_string(),
            error_type: "NetworkError".to_string(),
            similar_failures_count: 12,
            recent_deployments: vec!["v1.2.3 by ci-bot".to_string()],
            retry_count: 3,
            reasoning: "connection refused across the board".to_string(),
            recommended_action: "ESCALATE".to_string(),
            dedup_key: "dlq-systemic-orders-dlq-NetworkError".to_string(),
        }
    }

    #[test]
    fn severity_mapping_covers_all_three_tiers() {
        assert_eq!(pagerduty_severity("P1"), "critical");
        assert_eq!(pagerduty_severity("P2"), "error");
        assert_eq!(pagerduty_severity("P3"), "warning");
        assert_eq!(pagerduty_severity("unknown"), "info");
    }

    #[tokio::test]
    async fn trigger_returns_the_dedup_key_as_incident_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "status": "success",
                "message": "Event processed",
                "dedup_key": "dlq-systemic-orders-dlq-NetworkError",
            })))
            .mount(&server)
            .await;

        let client =
            PagerDutyIncidentClient::new("routing-key".to_string()).with_api_url(server.uri());

        let ack = client.trigger(request()).await.unwrap();
        assert_eq!(ack.incident_key, "dlq-systemic-orders-dlq-NetworkError");
    }

    #[tokio::test]
    async fn non_success_status_is_a_request_failed_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad routing key"))
            .mount(&server)
            .await;

        let client =
            PagerDutyIncidentClient::new("routing-key".to_string()).with_api_url(server.uri());

        let result = client.trigger(request()).await;
        assert!(matches!(result, Err(IncidentError::RequestFailed(_))));
    }
}
