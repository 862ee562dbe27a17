//! In-memory [`dlq_core::llm::LlmClassifier`] fakes.

use dlq_core::llm::{ClassificationRequest, ClassificationResponse, LlmClassifier, LlmError};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

/// A classifier that always returns the same configured response (or
/// error), and records every request it was given.
#[derive(Clone)]
pub struct FixedLlmClassifier {
    response: Result<ClassificationResponse, LlmError>,
    requests: Arc<RwLock<Vec<ClassificationRequest>>>,
}

impl FixedLlmClassifier {
    /// A classifier that always succeeds with `response`.
    #[must_use]
    pub fn succeeding(response: ClassificationResponse) -> Self {
        Self {
            response: Ok(response),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// A classifier that always fails with `error`.
    #[must_use]
    pub fn failing(error: LlmError) -> Self {
        Self {
            response: Err(error),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Every request passed to `classify`, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<ClassificationRequest> {
        self.requests.read().unwrap().clone()
    }
}

impl LlmClassifier for FixedLlmClassifier {
    fn classify(
        &self,
        request: ClassificationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ClassificationResponse, LlmError>> + Send + '_>> {
        self.requests.write().unwrap().push(request);
        let response = self.response.clone();
        Box::pin(async move { response })
    }
}

/// A classifier that returns a scripted sequence of responses, one per
/// call, for exercising multi-call scenarios (e.g. a timeout followed by a
/// successful retry). Panics if called more times than scripted.
#[derive(Clone)]
pub struct ScriptedLlmClassifier {
    responses: Arc<RwLock<VecDeque<Result<ClassificationResponse, LlmError>>>>,
}

impl ScriptedLlmClassifier {
    /// Build a classifier that replays `responses` in order, one per call.
    #[must_use]
    pub fn new(responses: Vec<Result<ClassificationResponse, LlmError>>) -> Self {
        Self {
            responses: Arc::new(RwLock::new(responses.into())),
        }
    }

    /// Number of scripted responses not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.read().unwrap().len()
    }
}

impl LlmClassifier for ScriptedLlmClassifier {
    fn classify(
        &self,
        _request: ClassificationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ClassificationResponse, LlmError>> + Send + '_>> {
        let next = self
            .responses
            .write()
            .unwrap()
            .pop_front()
            .expect("ScriptedLlmClassifier called more times than scripted");
        Box::pin(async move { next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlq_core::model::{Category, TokenUsage};

    fn response(category: Category) -> ClassificationResponse {
        ClassificationResponse {
            category,
            confidence: 0.9,
            reasoning: "looks transient".to_string(),
            tokens: TokenUsage::default(),
            model: "claude-3-5-haiku-20241022".to_string(),
        }
    }

    fn request() -> ClassificationRequest {
        ClassificationRequest {
            error_type: "NetworkError".to_string(),
            message: "connection refused".to_string(),
            stack_top: vec![],
            code: None,
            affected_service: "orders-service".to_string(),
            source_queue: "orders-dlq".to_string(),
            retry_count: 1,
            similar_failures_last_hour: 2,
            recent_deployments: vec![],
        }
    }

    #[tokio::test]
    async fn fixed_classifier_records_requests() {
        let classifier = FixedLlmClassifier::succeeding(response(Category::Transient));
        classifier.classify(request()).await.unwrap();
        classifier.classify(request()).await.unwrap();
        assert_eq!(classifier.requests().len(), 2);
    }

    #[tokio::test]
    async fn scripted_classifier_replays_in_order() {
        let classifier = ScriptedLlmClassifier::new(vec![
            Err(LlmError::Timeout),
            Ok(response(Category::Systemic)),
        ]);

        let first = classifier.classify(request()).await;
        assert!(matches!(first, Err(LlmError::Timeout)));

        let second = classifier.classify(request()).await.unwrap();
        assert_eq!(second.category, Category::Systemic);
        assert_eq!(classifier.remaining(), 0);
    }
}
