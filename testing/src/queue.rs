//! An in-memory [`dlq_core::queue::MessageQueueClient`] fake.
//!
//! Messages are seeded directly into a named queue's backlog. `receive`
//! moves them into an in-flight map keyed by receipt token; `delete`
//! removes them from there, so a delete with an unknown or already-used
//! token correctly fails with [`QueueError::InvalidReceipt`].

use dlq_core::queue::{MessageQueueClient, QueueError, QueueHandle, ReceivedMessage, SendAttributes};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

/// A message sent via [`MessageQueueClient::send_with_delay`], captured for
/// assertions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    /// The destination queue name.
    pub queue_name: String,
    /// The message body.
    pub body: Vec<u8>,
    /// The delay requested, in seconds.
    pub delay_s: u32,
    /// The attributes attached to the send.
    pub attributes: SendAttributes,
}

#[derive(Default)]
struct Inner {
    backlogs: HashMap<String, VecDeque<ReceivedMessage>>,
    in_flight: HashMap<String, ReceivedMessage>,
    sent: Vec<SentMessage>,
}

/// In-memory [`MessageQueueClient`] fake.
#[derive(Clone, Default)]
pub struct InMemoryQueueClient {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryQueueClient {
    /// An empty fake with no queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` to `queue`'s backlog, creating the queue if it
    /// does not exist yet.
    pub fn seed(&self, queue: &str, message: ReceivedMessage) {
        self.inner
            .write()
            .unwrap()
            .backlogs
            .entry(queue.to_string())
            .or_default()
            .push_back(message);
    }

    /// Messages sent via `send_with_delay`, in call order.
    #[must_use]
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.inner.read().unwrap().sent.clone()
    }

    /// Number of messages still sitting in `queue`'s backlog.
    #[must_use]
    pub fn backlog_len(&self, queue: &str) -> usize {
        self.inner
            .read()
            .unwrap()
            .backlogs
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    /// Clear all state: backlogs, in-flight receipts, and sent messages.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.backlogs.clear();
        inner.in_flight.clear();
        inner.sent.clear();
    }
}

impl MessageQueueClient for InMemoryQueueClient {
    fn discover_queues(
        &self,
        pattern: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<QueueHandle>, QueueError>> + Send + '_>> {
        let pattern = pattern.to_string();
        Box::pin(async move {
            let inner = self.inner.read().unwrap();
            Ok(inner
                .backlogs
                .keys()
                .filter(|name| name.contains(&pattern))
                .map(|name| QueueHandle { name: name.clone() })
                .collect())
        })
    }

    fn receive(
        &self,
        queue: &QueueHandle,
        max_messages: u32,
        _visibility_timeout_s: u32,
        _wait_time_s: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ReceivedMessage>, QueueError>> + Send + '_>> {
        let queue_name = queue.name.clone();
        Box::pin(async move {
            let mut inner = self.inner.write().unwrap();
            let Some(backlog) = inner.backlogs.get_mut(&queue_name) else {
                return Err(QueueError::UnknownQueue(queue_name));
            };
            let mut received = Vec::new();
            for _ in 0..max_messages {
                let Some(message) = backlog.pop_front() else {
                    break;
                };
                received.push(message);
            }
            for message in &received {
                inner
                    .in_flight
                    .insert(message.receipt_token.clone(), message.clone());
            }
            Ok(received)
        })
    }

    fn delete(
        &self,
        _queue: &QueueHandle,
        receipt_token: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>> {
        let receipt_token = receipt_token.to_string();
        Box::pin(async move {
            let mut inner = self.inner.write().unwrap();
            inner
                .in_flight
                .remove(&receipt_token)
                .map(|_| ())
                .ok_or(QueueError::InvalidReceipt)
        })
    }

    fn send_with_delay(
        &self,
        queue_name: &str,
        body: &[u8],
        delay_s: u32,
        attributes: SendAttributes,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>> {
        let queue_name = queue_name.to_string();
        let body = body.to_vec();
        Box::pin(async move {
            self.inner.write().unwrap().sent.push(SentMessage {
                queue_name,
                body,
                delay_s,
                attributes,
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, receipt: &str) -> ReceivedMessage {
        ReceivedMessage {
            message_id: id.to_string(),
            receipt_token: receipt.to_string(),
            body: b"{}".to_vec(),
            receive_count: 1,
        }
    }

    #[tokio::test]
    async fn discover_matches_by_substring() {
        let client = InMemoryQueueClient::new();
        client.seed("orders-dlq", message("m1", "r1"));
        client.seed("billing", message("m2", "r2"));

        let found = client.discover_queues("-dlq").await.unwrap();
        assert_eq!(found, vec![QueueHandle { name: "orders-dlq".to_string() }]);
    }

    #[tokio::test]
    async fn receive_then_delete_round_trips() {
        let client = InMemoryQueueClient::new();
        client.seed("orders-dlq", message("m1", "r1"));
        let queue = QueueHandle { name: "orders-dlq".to_string() };

        let received = client.receive(&queue, 10, 300, 10).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(client.backlog_len("orders-dlq"), 0);

        client.delete(&queue, "r1").await.unwrap();
        let second_delete = client.delete(&queue, "r1").await;
        assert!(matches!(second_delete, Err(QueueError::InvalidReceipt)));
    }

    #[tokio::test]
    async fn receive_from_unknown_queue_errors() {
        let client = InMemoryQueueClient::new();
        let queue = QueueHandle { name: "missing".to_string() };
        let result = client.receive(&queue, 10, 300, 10).await;
        assert!(matches!(result, Err(QueueError::UnknownQueue(_))));
    }

    #[tokio::test]
    async fn send_with_delay_is_captured() {
        let client = InMemoryQueueClient::new();
        client
            .send_with_delay("orders", b"body", 30, SendAttributes::default())
            .await
            .unwrap();
        assert_eq!(client.sent_messages().len(), 1);
    }
}
