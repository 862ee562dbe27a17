//! An in-memory [`dlq_core::alert::AlertPublisher`] fake.

use dlq_core::alert::{Alert, AlertError, AlertPublisher};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

/// In-memory [`AlertPublisher`] fake that records every published alert.
#[derive(Clone, Default)]
pub struct InMemoryAlertPublisher {
    published: Arc<RwLock<Vec<Alert>>>,
}

impl InMemoryAlertPublisher {
    /// A fake with no alerts yet published.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every alert published so far, in publish order.
    #[must_use]
    pub fn published(&self) -> Vec<Alert> {
        self.published.read().unwrap().clone()
    }

    /// Number of alerts published.
    #[must_use]
    pub fn len(&self) -> usize {
        self.published.read().unwrap().len()
    }

    /// Whether no alert has been published yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget all published alerts.
    pub fn clear(&self) {
        self.published.write().unwrap().clear();
    }
}

impl AlertPublisher for InMemoryAlertPublisher {
    fn publish(
        &self,
        alert: Alert,
    ) -> Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + '_>> {
        Box::pin(async move {
            self.published.write().unwrap().push(alert);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_is_recorded() {
        let publisher = InMemoryAlertPublisher::new();
        publisher
            .publish(Alert {
                message_id: "m1".to_string(),
                source_queue: "orders-dlq".to_string(),
                summary: "poison-pill detected and archived".to_string(),
                reasoning: "null dereference".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(publisher.len(), 1);
    }
}
