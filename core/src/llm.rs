//! LLM-backed classification fallback (§4.2 step 4).
//!
//! Invoked only on a cache miss with no confident heuristic match. The
//! prompt is built from a [`ClassificationRequest`] with PII already
//! redacted by the caller (via [`crate::redaction::redact`]); the
//! response must conform to the strict `{category, confidence,
//! reasoning}` JSON contract, tolerating markdown code-fencing around it.

use crate::model::{Category, TokenUsage};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur while classifying via the LLM.
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    /// The underlying request failed (network, timeout, non-2xx).
    #[error("llm request failed: {0}")]
    RequestFailed(String),

    /// The request exceeded its deadline (§4.2: LLM calls carry a
    /// bounded timeout; a timeout is treated as a classification
    /// failure, not a retryable transient).
    #[error("llm request timed out")]
    Timeout,

    /// The response body did not conform to the `{category, confidence,
    /// reasoning}` contract after stripping markdown fencing.
    #[error("llm response did not match the expected contract: {0}")]
    MalformedResponse(String),
}

/// Inputs to an LLM classification call. PII must already be redacted
/// by the caller (§4.2 step 3).
#[derive(Clone, Debug)]
pub struct ClassificationRequest {
    /// Redacted error type.
    pub error_type: String,
    /// Redacted, truncated error message.
    pub message: String,
    /// Redacted stack frames, if any.
    pub stack_top: Vec<String>,
    /// Error code, if present.
    pub code: Option<String>,
    /// The affected service name.
    pub affected_service: String,
    /// The queue the message came from, for context.
    pub source_queue: String,
    /// Monitor-observed retry count, for context.
    pub retry_count: u32,
    /// Count of similar failures in the trailing hour, for context.
    pub similar_failures_last_hour: u32,
    /// Redacted `"<version> by <author>"` lines for recent deployments.
    pub recent_deployments: Vec<String>,
}

/// A successful classification result from the LLM.
#[derive(Clone, Debug)]
pub struct ClassificationResponse {
    /// The classified category.
    pub category: Category,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Free-text reasoning, surfaced to operators verbatim.
    pub reasoning: String,
    /// Token accounting for cost attribution (§3 `tokens`).
    pub tokens: TokenUsage,
    /// The concrete model identifier used, e.g. `claude-3-5-haiku-20241022`
    /// (§13: the literal configured model string, not a generic tag).
    pub model: String,
}

/// Classifies a DLQ failure using a large language model.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so this trait can be used
/// as `Arc<dyn LlmClassifier>`.
pub trait LlmClassifier: Send + Sync {
    /// Classify `request`. Implementations must enforce a low-temperature
    /// (≤0.2) decode and a bounded timeout (§4.2 step 4).
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Timeout`] if the deadline elapses,
    /// [`LlmError::MalformedResponse`] if the response cannot be parsed
    /// into the `{category, confidence, reasoning}` contract even after
    /// stripping markdown fencing, or [`LlmError::RequestFailed`] for any
    /// other failure.
    fn classify(
        &self,
        request: ClassificationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ClassificationResponse, LlmError>> + Send + '_>>;
}

/// Strip a leading/trailing ```` ``` ```` or ```` ```json ```` fence, if
/// present, before parsing the LLM's response body as JSON (§4.2 step 4:
/// "tolerate markdown-fenced JSON").
#[must_use]
pub fn strip_markdown_fence(body: &str) -> &str {
    let trimmed = body.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_plain_fence() {
        let body = "```\n{\"category\":\"TRANSIENT\"}\n```";
        assert_eq!(strip_markdown_fence(body), "{\"category\":\"TRANSIENT\"}");
    }

    #[test]
    fn strips_json_tagged_fence() {
        let body = "```json\n{\"category\":\"TRANSIENT\"}\n```";
        assert_eq!(strip_markdown_fence(body), "{\"category\":\"TRANSIENT\"}");
    }

    #[test]
    fn leaves_unfenced_body_alone() {
        let body = "{\"category\":\"TRANSIENT\"}";
        assert_eq!(strip_markdown_fence(body), body);
    }
}
