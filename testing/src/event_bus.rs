//! An in-memory [`dlq_core::event_bus::EventBus`] fake.
//!
//! Each topic is backed by a `tokio::sync::broadcast` channel, mirroring
//! `dlq-redpanda`'s shape: `subscribe` spawns a forwarding task per topic
//! that pushes into a shared `mpsc` channel, which is then wrapped as the
//! returned [`EventStream`]. Unlike the Redpanda implementation there is no
//! offset to commit — delivery here is simply "whoever is subscribed when
//! `publish` is called receives it," which is enough to exercise a
//! pipeline stage's consume loop without a real broker.

use dlq_core::event::SerializedEvent;
use dlq_core::event_bus::{EventBus, EventBusError, EventStream};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 1024;

/// In-memory [`EventBus`] fake.
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<SerializedEvent>>>>,
    published: Arc<RwLock<HashMap<String, usize>>>,
}

impl InMemoryEventBus {
    /// A bus with no topics yet created.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of events published to `topic` so far, independent of
    /// whether anything is currently subscribed.
    #[must_use]
    pub fn published_count(&self, topic: &str) -> usize {
        self.published.read().unwrap().get(topic).copied().unwrap_or(0)
    }

    /// Total number of events published across every topic.
    #[must_use]
    pub fn len(&self) -> usize {
        self.published.read().unwrap().values().sum()
    }

    /// Whether no events have been published to any topic yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<SerializedEvent> {
        if let Some(sender) = self.topics.read().unwrap().get(topic) {
            return sender.clone();
        }
        let mut topics = self.topics.write().unwrap();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let sender = self.sender_for(topic);
        let event = event.clone();
        let published = self.published.clone();
        let topic = topic.to_string();
        Box::pin(async move {
            *published.write().unwrap().entry(topic).or_insert(0) += 1;
            // No subscribers is not an error: the Monitor may publish
            // before the Analyzer's consumer loop has subscribed.
            let _ = sender.send(event);
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let receivers: Vec<broadcast::Receiver<SerializedEvent>> =
            topics.iter().map(|topic| self.sender_for(topic).subscribe()).collect();

        Box::pin(async move {
            let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);

            for mut receiver in receivers {
                let tx = tx.clone();
                tokio::spawn(async move {
                    loop {
                        match receiver.recv().await {
                            Ok(event) => {
                                if tx.send(Ok(event)).await.is_err() {
                                    break;
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                });
            }

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}
