//! An in-memory [`dlq_core::incident::IncidentClient`] fake.

use dlq_core::incident::{IncidentAck, IncidentClient, IncidentError, IncidentRequest};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

/// In-memory [`IncidentClient`] fake. `trigger` always succeeds, echoing
/// the request's `dedup_key` back as the ack's `incident_key` — matching
/// the real incident API's dedup-by-key behavior.
#[derive(Clone, Default)]
pub struct InMemoryIncidentClient {
    triggered: Arc<RwLock<Vec<IncidentRequest>>>,
}

impl InMemoryIncidentClient {
    /// A fake with no incidents triggered yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request passed to `trigger`, in call order.
    #[must_use]
    pub fn triggered(&self) -> Vec<IncidentRequest> {
        self.triggered.read().unwrap().clone()
    }

    /// Number of incidents triggered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.triggered.read().unwrap().len()
    }

    /// Whether no incident has been triggered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget all triggered incidents.
    pub fn clear(&self) {
        self.triggered.write().unwrap().clear();
    }
}

impl IncidentClient for InMemoryIncidentClient {
    fn trigger(
        &self,
        request: IncidentRequest,
    ) -> Pin<Box<dyn Future<Output = Result<IncidentAck, IncidentError>> + Send + '_>> {
        Box::pin(async move {
            let incident_key = request.dedup_key.clone();
            self.triggered.write().unwrap().push(request);
            Ok(IncidentAck { incident_key })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
            recent_deployments: vec![],
            retry_count: 3,
            reasoning: "connection refused".to_string(),
            recommended_action: "ESCALATE".to_string(),
            dedup_key: "dlq-systemic-orders-dlq-NetworkError".to_string(),
        }
    }

    #[tokio::test]
    async fn trigger_echoes_dedup_key_as_incident_key() {
        let client = InMemoryIncidentClient::new();
        let ack = client.trigger(request()).await.unwrap();
        assert_eq!(ack.incident_key, "dlq-systemic-orders-dlq-NetworkError");
        assert_eq!(client.len(), 1);
    }
}
