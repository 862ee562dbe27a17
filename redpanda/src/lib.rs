//! Redpanda/Kafka-backed [`EventBus`] for the DLQ recovery pipeline.
//!
//! This crate provides the production `EventBus` the Monitor, Analyzer and
//! Executor are wired against in `dlq-service`: the Monitor publishes
//! `MessageEnriched`, the Analyzer consumes it and publishes
//! `MessageClassified`, and the Executor consumes that (§6). The Executor's
//! Archive handler also publishes poison-pill alerts through the same
//! trait, on a separate topic.
//!
//! # Delivery semantics
//!
//! At-least-once, with manual offset commits: an offset is committed only
//! after the event has been handed to the subscriber's channel, never
//! before. If the process crashes between receipt and commit, the event is
//! redelivered — by construction, every pipeline stage built against this
//! bus is keyed on `message_id` and tolerates that (§5, §9). Ordering is
//! preserved within a partition; events are keyed by `event_type` so that
//! all events of one kind land on the same partition.
//!
//! # Example
//!
//! ```no_run
//! use dlq_redpanda::RedpandaEventBus;
//! use dlq_core::event_bus::EventBus;
//! use dlq_core::event::SerializedEvent;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let event_bus = RedpandaEventBus::new("localhost:9092")?;
//!
//! let event = SerializedEvent::new("MessageEnriched".to_string(), vec![1, 2, 3], None);
//! event_bus.publish("message-enriched", &event).await?;
//!
//! let mut stream = event_bus.subscribe(&["message-enriched"]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(event) => println!("received: {}", event.event_type),
//!         Err(e) => eprintln!("error: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use dlq_core::event::SerializedEvent;
use dlq_core::event_bus::{EventBus, EventBusError, EventStream};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Redpanda/Kafka-backed [`EventBus`].
///
/// # Topic naming (§6)
///
/// - `message-enriched` — published by the Monitor.
/// - `message-classified` — published by the Analyzer.
/// - `poison-pill-alerts` — published by the Executor's Archive handler.
pub struct RedpandaEventBus {
    producer: FutureProducer,
    brokers: String,
    timeout: Duration,
    consumer_group: Option<String>,
    buffer_size: usize,
    auto_offset_reset: String,
}

impl RedpandaEventBus {
    /// Create a new event bus with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the producer cannot
    /// be created (invalid broker addresses, etc).
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// A builder for configuring producer/consumer settings.
    #[must_use]
    pub fn builder() -> RedpandaEventBusBuilder {
        RedpandaEventBusBuilder::default()
    }

    /// The configured broker addresses.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }
}

/// Builder for [`RedpandaEventBus`].
#[derive(Default)]
pub struct RedpandaEventBusBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
}

impl RedpandaEventBusBuilder {
    /// Comma-separated list of broker addresses (e.g. `localhost:9092`).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Producer acknowledgment mode: `"0"`, `"1"` (default) or `"all"`.
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Compression codec: `"none"` (default), `"gzip"`, `"snappy"`, `"lz4"`, `"zstd"`.
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Producer send timeout. Default 5 seconds.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Explicit consumer group id. If unset, one is derived from the
    /// sorted subscribed topics so that repeated subscriptions to the same
    /// topic set share a group.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Event buffer size between the Kafka consumer task and the
    /// subscriber's stream. Default 1000.
    ///
    /// # Panics
    ///
    /// Panics if `buffer_size` is 0.
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        assert!(buffer_size > 0, "buffer_size must be greater than 0");
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Where a new consumer group starts reading: `"earliest"` or
    /// `"latest"` (default).
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the [`RedpandaEventBus`].
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if brokers are unset or
    /// the underlying producer cannot be created.
    pub fn build(self) -> Result<RedpandaEventBus, EventBusError> {
        let brokers = self
            .brokers
            .ok_or_else(|| EventBusError::ConnectionFailed("brokers not configured".to_string()))?;

        let mut producer_config = ClientConfig::new();
        producer_config
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", self.producer_acks.as_deref().unwrap_or("1"))
            .set("compression.type", self.compression.as_deref().unwrap_or("none"));

        let producer: FutureProducer = producer_config
            .create()
            .map_err(|e| EventBusError::ConnectionFailed(format!("failed to create producer: {e}")))?;

        tracing::info!(
            brokers = %brokers,
            acks = self.producer_acks.as_deref().unwrap_or("1"),
            compression = self.compression.as_deref().unwrap_or("none"),
            "redpanda event bus created"
        );

        Ok(RedpandaEventBus {
            producer,
            brokers,
            timeout: self.timeout.unwrap_or(Duration::from_secs(5)),
            consumer_group: self.consumer_group,
            buffer_size: self.buffer_size.unwrap_or(1000),
            auto_offset_reset: self.auto_offset_reset.unwrap_or_else(|| "latest".to_string()),
        })
    }
}

impl EventBus for RedpandaEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let event = event.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let envelope = EventEnvelope::from(&event);
            let payload = serde_json::to_vec(&envelope).map_err(|e| EventBusError::PublishFailed {
                topic: topic.clone(),
                reason: format!("failed to serialize event: {e}"),
            })?;

            let key = event.event_type.as_bytes();
            let record = FutureRecord::to(&topic).payload(&payload).key(key);

            match self.producer.send(record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition,
                        offset,
                        event_type = %event.event_type,
                        "event published"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(topic = %topic, error = %kafka_error, "failed to publish event");
                    Err(EventBusError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }

    #[allow(clippy::too_many_lines)] // at-least-once delivery with manual commits is inherently this long
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();
        let brokers = self.brokers.clone();
        let consumer_group = self.consumer_group.clone();
        let buffer_size = self.buffer_size;
        let auto_offset_reset = self.auto_offset_reset.clone();

        Box::pin(async move {
            let consumer_group_id = consumer_group.unwrap_or_else(|| {
                let mut sorted_topics = topics.clone();
                sorted_topics.sort();
                format!("dlq-pipeline-{}", sorted_topics.join("-"))
            });

            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &consumer_group_id)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("failed to create consumer: {e}"),
                })?;

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer.subscribe(&topic_refs).map_err(|e| EventBusError::SubscriptionFailed {
                topics: topics.clone(),
                reason: format!("failed to subscribe to topics: {e}"),
            })?;

            tracing::info!(
                topics = ?topics,
                consumer_group = %consumer_group_id,
                "subscribed to topics"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

            tokio::spawn(async move {
                use futures::StreamExt;
                use rdkafka::consumer::CommitMode;

                let mut stream = consumer.stream();

                while let Some(msg_result) = stream.next().await {
                    match msg_result {
                        Ok(message) => {
                            let Some(payload) = message.payload() else {
                                let err = EventBusError::DeserializationFailed("message has no payload".to_string());
                                if tx.send(Err(err)).await.is_err() {
                                    break;
                                }
                                if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                                    tracing::warn!(error = %e, "failed to commit message with no payload");
                                }
                                continue;
                            };

                            let event_result = match serde_json::from_slice::<EventEnvelope>(payload) {
                                Ok(envelope) => Ok(envelope.into()),
                                Err(e) => Err(EventBusError::DeserializationFailed(format!(
                                    "failed to deserialize event: {e}"
                                ))),
                            };

                            // Commit only after the event is handed to the channel: this is
                            // what makes a crash before commit safe to redeliver (§5).
                            if tx.send(event_result).await.is_err() {
                                tracing::debug!("channel receiver dropped, exiting consumer task");
                                break;
                            }

                            if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                                tracing::warn!(
                                    topic = message.topic(),
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    error = %e,
                                    "failed to commit offset, message may be redelivered"
                                );
                            }
                        }
                        Err(e) => {
                            let err = EventBusError::TransportError(format!("failed to receive message: {e}"));
                            if tx.send(Err(err)).await.is_err() {
                                break;
                            }
                        }
                    }
                }

                tracing::debug!("consumer task exiting");
            });

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

/// Wire shape for an event on the Kafka topic: JSON so operators can
/// inspect topic contents directly (the pipeline's events are
/// EventBridge-shaped per `dlq_core::event`, meant to be human-readable).
#[derive(serde::Serialize, serde::Deserialize)]
struct EventEnvelope {
    event_type: String,
    data: Vec<u8>,
    metadata: Option<serde_json::Value>,
}

impl From<&SerializedEvent> for EventEnvelope {
    fn from(event: &SerializedEvent) -> Self {
        Self {
            event_type: event.event_type.clone(),
            data: event.data.clone(),
            metadata: event.metadata.clone(),
        }
    }
}

impl From<EventEnvelope> for SerializedEvent {
    fn from(envelope: EventEnvelope) -> Self {
        Self::new(envelope.event_type, envelope.data, envelope.metadata)
    }
}
