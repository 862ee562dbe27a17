//! [`LlmClassifier`] implementation backed by the Anthropic Messages API
//! (§4.2 step 4).
//!
//! This is the only place in the workspace that talks to the LLM: the
//! Analyzer never constructs a prompt itself, it hands over an already
//! redacted [`ClassificationRequest`] and gets back a validated
//! [`ClassificationResponse`] or an [`LlmError`].

use crate::client::AnthropicClient;
use crate::messages::MessagesRequest;
use crate::types::{ContentBlock, Message};
use dlq_core::llm::{ClassificationRequest, ClassificationResponse, LlmClassifier, LlmError};
use dlq_core::llm::strip_markdown_fence;
use dlq_core::model::{Category, TokenUsage};
use dlq_resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use dlq_resilience::metrics::CircuitBreakerMetrics;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Name the `AnthropicDlqClassifier`'s circuit breaker reports metrics under.
const BREAKER_NAME: &str = "llm-classifier";

const SYSTEM_PROMPT: &str = "You are a failure-triage assistant for a dead-letter-queue \
recovery pipeline. You will be given the identity of one failed message. Respond with a \
single JSON object and nothing else: {\"category\": \"TRANSIENT\"|\"POISON_PILL\"|\"SYSTEMIC\", \
\"confidence\": <number 0..1>, \"reasoning\": \"<short explanation>\"}. TRANSIENT means the \
failure is likely to succeed if replayed after a short backoff. POISON_PILL means the message \
content is intrinsically unprocessable and retries cannot succeed. SYSTEMIC means the cause is \
external to the message and likely affects many messages at once (bad deployment, dependency \
outage). Do not wrap the JSON in markdown and do not include any other text.";

#[derive(Deserialize)]
struct RawClassification {
    category: String,
    confidence: f64,
    reasoning: String,
}

fn build_prompt(request: &ClassificationRequest) -> String {
    let code = request.code.as_deref().unwrap_or("none");
    let stack = if request.stack_top.is_empty() {
        "none".to_string()
    } else {
        request.stack_top.join(" | ")
    };
    let deployments = if request.recent_deployments.is_empty() {
        "none".to_string()
    } else {
        request.recent_deployments.join(", ")
    };

    format!(
        "error_type: {}\ncode: {code}\nmessage: {}\nstack_top: {stack}\nsource_queue: {}\n\
affected_service: {}\nretry_count: {}\nsimilar_failures_last_hour: {}\nrecent_deployments: {deployments}",
        request.error_type,
        request.message,
        request.source_queue,
        request.affected_service,
        request.retry_count,
        request.similar_failures_last_hour,
    )
}

/// Parse the first JSON object found in `body`, tolerating markdown fencing.
fn parse_response(body: &str) -> Result<RawClassification, LlmError> {
    let stripped = strip_markdown_fence(body);
    let start = stripped
        .find('{')
        .ok_or_else(|| LlmError::MalformedResponse("no JSON object found in response".to_string()))?;
    let end = stripped
        .rfind('}')
        .ok_or_else(|| LlmError::MalformedResponse("no JSON object found in response".to_string()))?;
    if end < start {
        return Err(LlmError::MalformedResponse("unbalanced braces in response".to_string()));
    }
    serde_json::from_str(&stripped[start..=end])
        .map_err(|e| LlmError::MalformedResponse(e.to_string()))
}

fn validate(raw: RawClassification) -> Result<(Category, f64, String), LlmError> {
    let category = Category::parse(&raw.category)
        .ok_or_else(|| LlmError::MalformedResponse(format!("unknown category: {}", raw.category)))?;
    if !(0.0..=1.0).contains(&raw.confidence) {
        return Err(LlmError::MalformedResponse(format!(
            "confidence out of range: {}",
            raw.confidence
        )));
    }
    if raw.reasoning.trim().is_empty() {
        return Err(LlmError::MalformedResponse("empty reasoning".to_string()));
    }
    Ok((category, raw.confidence, raw.reasoning))
}

/// Classifies DLQ failures by calling the Anthropic Messages API with a
/// low-temperature, JSON-only prompt.
pub struct AnthropicDlqClassifier {
    client: AnthropicClient,
    model: String,
    max_tokens: u32,
    temperature: f64,
    timeout: Duration,
    breaker: CircuitBreaker,
}

impl AnthropicDlqClassifier {
    /// Build a classifier over `client`. `temperature` must be `<= 0.2`
    /// per §4.2 step 4; this is enforced by `dlq_core::config::AnalyzerConfig::validate`
    /// upstream, not re-checked here.
    ///
    /// Calls go through a circuit breaker with the library default
    /// configuration; use [`with_circuit_breaker`](Self::with_circuit_breaker)
    /// to override it.
    #[must_use]
    pub fn new(client: AnthropicClient, model: String, max_tokens: u32, temperature: f64, timeout: Duration) -> Self {
        Self {
            client,
            model,
            max_tokens,
            temperature,
            timeout,
            breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
        }
    }

    /// Replace the circuit breaker guarding calls to the Messages API.
    #[must_use]
    pub fn with_circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = breaker;
        self
    }
}

impl LlmClassifier for AnthropicDlqClassifier {
    fn classify(
        &self,
        request: ClassificationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ClassificationResponse, LlmError>> + Send + '_>> {
        Box::pin(async move {
            let prompt = build_prompt(&request);
            let body = MessagesRequest::new(vec![Message::user(prompt)])
                .with_model(self.model.clone())
                .with_max_tokens(self.max_tokens)
                .with_system(SYSTEM_PROMPT.to_string());
            let body = MessagesRequest {
                temperature: Some(self.temperature),
                ..body
            };

            CircuitBreakerMetrics::record_call(BREAKER_NAME);
            let outcome = tokio::time::timeout(self.timeout, self.breaker.call(|| self.client.messages(body)))
                .await
                .map_err(|_| LlmError::Timeout)?;

            let response = match outcome {
                Ok(response) => {
                    CircuitBreakerMetrics::record_success(BREAKER_NAME);
                    response
                }
                Err(CircuitBreakerError::Open) => {
                    CircuitBreakerMetrics::record_rejection(BREAKER_NAME);
                    return Err(LlmError::RequestFailed("circuit breaker open".to_string()));
                }
                Err(CircuitBreakerError::Inner(e)) => {
                    CircuitBreakerMetrics::record_failure(BREAKER_NAME);
                    return Err(LlmError::RequestFailed(e.to_string()));
                }
            };

            let text = response
                .content
                .iter()
                .find_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .ok_or_else(|| LlmError::MalformedResponse("no text content block in response".to_string()))?;

            let (category, confidence, reasoning) = validate(parse_response(text)?)?;

            Ok(ClassificationResponse {
                category,
                confidence,
                reasoning,
                tokens: TokenUsage {
                    input: response.usage.input_tokens,
                    output: response.usage.output_tokens,
                },
                model: response.model,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json_response() {
        let body = r#"{"category":"TRANSIENT","confidence":0.8,"reasoning":"looks transient"}"#;
        let raw = parse_response(body).expect("should parse");
        assert_eq!(raw.category, "TRANSIENT");
    }

    #[test]
    fn parses_fenced_json_response() {
        let body = "```json\n{\"category\":\"POISON_PILL\",\"confidence\":0.9,\"reasoning\":\"bad\"}\n```";
        let raw = parse_response(body).expect("should parse");
        assert_eq!(raw.category, "POISON_PILL");
    }

    #[test]
    fn rejects_unknown_category() {
        let raw = RawClassification {
            category: "UNKNOWN".to_string(),
            confidence: 0.5,
            reasoning: "x".to_string(),
        };
        assert!(validate(raw).is_err());
    }

    #[test]
    fn rejects_confidence_out_of_range() {
        let raw = RawClassification {
            category: "TRANSIENT".to_string(),
            confidence: 1.5,
            reasoning: "x".to_string(),
        };
        assert!(validate(raw).is_err());
    }

    #[test]
    fn rejects_empty_reasoning() {
        let raw = RawClassification {
            category: "TRANSIENT".to_string(),
            confidence: 0.5,
            reasoning: String::new(),
        };
        assert!(validate(raw).is_err());
    }

    #[test]
    fn errors_when_no_json_object_present() {
        let err = parse_response("not json at all").unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse(_)));
    }
}
