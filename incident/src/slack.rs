//! Slack-incoming-webhook-backed [`AlertPublisher`] for operator-facing
//! poison-pill and archive notices (§4.2, §4.3).
//!
//! Distinct from [`PagerDutyIncidentClient`](crate::PagerDutyIncidentClient):
//! this fans out human-readable notices to a Slack channel rather than
//! opening a paged incident, and is never gated by `incident_integration_enabled`.

use dlq_core::alert::{Alert, AlertError, AlertPublisher};
use dlq_resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use dlq_resilience::metrics::{CircuitBreakerMetrics, RetryMetrics};
use dlq_resilience::retry::{retry_with_backoff, RetryPolicy};
use reqwest::Client;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

const BREAKER_NAME: &str = "slack-alert-publisher";
const RETRY_OPERATION: &str = "alert.publish";

/// Slack incoming-webhook-backed [`AlertPublisher`].
#[derive(Clone)]
pub struct SlackAlertPublisher {
    client: Client,
    webhook_url: String,
    retry_policy: RetryPolicy,
    breaker: CircuitBreaker,
}

impl SlackAlertPublisher {
    /// Build a publisher posting to the given Slack incoming-webhook URL.
    #[must_use]
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
            retry_policy: RetryPolicy::builder()
                .max_retries(2)
                .initial_delay(Duration::from_millis(200))
                .max_delay(Duration::from_secs(5))
                .multiplier(2.0)
                .build(),
            breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
        }
    }

    /// Read the webhook URL from `SLACK_ALERT_WEBHOOK_URL`.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::PublishFailed`] if the variable is unset.
    pub fn from_env() -> Result<Self, AlertError> {
        let webhook_url = std::env::var("SLACK_ALERT_WEBHOOK_URL")
            .map_err(|_| AlertError::PublishFailed("SLACK_ALERT_WEBHOOK_URL not set".to_string()))?;
        Ok(Self::new(webhook_url))
    }

    /// Replace the retry policy applied to a failed publish.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Replace the circuit breaker guarding calls to the webhook.
    #[must_use]
    pub fn with_circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = breaker;
        self
    }

    async fn send_once(&self, body: &SlackMessage) -> Result<(), AlertError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(body)
            .send()
            .await
            .map_err(|e| AlertError::PublishFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AlertError::PublishFailed(format!("slack webhook returned {status}: {text}")));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct SlackMessage {
    text: String,
}

impl SlackMessage {
    fn from_alert(alert: &Alert) -> Self {
        Self {
            text: format!(
                "*{}* (`{}` from `{}`)\n{}",
                alert.summary, alert.message_id, alert.source_queue, alert.reasoning
            ),
        }
    }
}

impl AlertPublisher for SlackAlertPublisher {
    fn publish(&self, alert: Alert) -> Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + '_>> {
        Box::pin(async move {
            let body = SlackMessage::from_alert(&alert);

            CircuitBreakerMetrics::record_call(BREAKER_NAME);
            let outcome = self
                .breaker
                .call(|| {
                    retry_with_backoff(self.retry_policy.clone(), || {
                        RetryMetrics::record_attempt(RETRY_OPERATION);
                        self.send_once(&body)
                    })
                })
                .await;

            match outcome {
                Ok(()) => {
                    CircuitBreakerMetrics::record_success(BREAKER_NAME);
                    RetryMetrics::record_success(RETRY_OPERATION);
                    tracing::info!(message_id = %alert.message_id, "alert published to slack");
                    metrics::counter!("executor.alert.published").increment(1);
                    Ok(())
                }
                Err(CircuitBreakerError::Open) => {
                    CircuitBreakerMetrics::record_rejection(BREAKER_NAME);
                    Err(AlertError::PublishFailed("circuit breaker open".to_string()))
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

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert() -> Alert {
        Alert {
            message_id: "m1".to_string(),
            source_queue: "orders-dlq".to_string(),
            summary: "poison-pill detected and archived".to_string(),
            reasoning: "schema validation error".to_string(),
        }
    }

    #[tokio::test]
    async fn publish_succeeds_on_a_2xx_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let publisher = SlackAlertPublisher::new(server.uri());
        publisher.publish(alert()).await.expect("publish should succeed");
    }

    #[tokio::test]
    async fn publish_fails_on_a_non_2xx_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no_webhook"))
            .mount(&server)
            .await;

        let publisher = SlackAlertPublisher::new(server.uri())
            .with_retry_policy(RetryPolicy::builder().max_retries(0).build());
        let result = publisher.publish(alert()).await;
        assert!(matches!(result, Err(AlertError::PublishFailed(_))));
    }
}
