//! Postgres-backed [`MessageQueueClient`].
//!
//! The workspace has no message-queue vendor dependency (no AWS SDK, no
//! Kafka-as-a-queue shim), so this implementation models the queue service
//! itself as a table, polled with `FOR UPDATE SKIP LOCKED` the way a
//! Postgres-backed job queue normally is. Visibility timeouts are just a
//! future `available_at`; a message becomes visible again automatically if
//! nothing deletes it before the timeout elapses.
//!
//! ```sql
//! CREATE TABLE queue_messages (
//!     id                      BIGSERIAL PRIMARY KEY,
//!     queue_name              TEXT NOT NULL,
//!     message_id              TEXT NOT NULL,
//!     body                    BYTEA NOT NULL,
//!     receive_count           INTEGER NOT NULL DEFAULT 0,
//!     available_at            TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     receipt_token           TEXT,
//!     retry_count             INTEGER,
//!     original_message_id     TEXT,
//!     classification_category TEXT
//! );
//! CREATE INDEX queue_messages_poll_idx ON queue_messages (queue_name, available_at);
//! ```

use dlq_core::queue::{MessageQueueClient, QueueError, QueueHandle, ReceivedMessage, SendAttributes};
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use uuid::Uuid;

/// How long to wait between empty polls while long-polling (§4.1).
const POLL_INTERVAL_MS: u64 = 200;

/// Postgres-backed queue service.
pub struct PostgresQueueClient {
    pool: PgPool,
}

impl PostgresQueueClient {
    /// Create a new queue client over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn receive_once(
        &self,
        queue_name: &str,
        max_messages: u32,
        visibility_timeout_s: u32,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

        let rows = sqlx::query(
            r"
            SELECT id, message_id, body, receive_count
            FROM queue_messages
            WHERE queue_name = $1 AND available_at <= now()
            ORDER BY id
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            ",
        )
        .bind(queue_name)
        .bind(i64::from(max_messages))
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| QueueError::Transport(e.to_string()))?;

        let mut received = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let message_id: String = row.get("message_id");
            let body: Vec<u8> = row.get("body");
            let receive_count: i32 = row.get("receive_count");
            let receipt_token = Uuid::new_v4().to_string();

            sqlx::query(
                r"
                UPDATE queue_messages
                SET receipt_token = $1,
                    receive_count = receive_count + 1,
                    available_at = now() + ($2 || ' seconds')::interval
                WHERE id = $3
                ",
            )
            .bind(&receipt_token)
            .bind(i64::from(visibility_timeout_s))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

            received.push(ReceivedMessage {
                message_id,
                receipt_token,
                body,
                receive_count: receive_count as u32 + 1,
            });
        }

        tx.commit().await.map_err(|e| QueueError::Transport(e.to_string()))?;
        Ok(received)
    }
}

impl MessageQueueClient for PostgresQueueClient {
    fn discover_queues(
        &self,
        pattern: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<QueueHandle>, QueueError>> + Send + '_>> {
        let like_pattern = format!("%{pattern}%");
        Box::pin(async move {
            let rows = sqlx::query("SELECT DISTINCT queue_name FROM queue_messages WHERE queue_name LIKE $1")
                .bind(&like_pattern)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| QueueError::Transport(e.to_string()))?;

            Ok(rows
                .into_iter()
                .map(|row| QueueHandle {
                    name: row.get("queue_name"),
                })
                .collect())
        })
    }

    fn receive(
        &self,
        queue: &QueueHandle,
        max_messages: u32,
        visibility_timeout_s: u32,
        wait_time_s: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ReceivedMessage>, QueueError>> + Send + '_>> {
        let queue_name = queue.name.clone();
        Box::pin(async move {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(u64::from(wait_time_s));
            loop {
                let batch = self
                    .receive_once(&queue_name, max_messages, visibility_timeout_s)
                    .await?;
                if !batch.is_empty() || tokio::time::Instant::now() >= deadline {
                    return Ok(batch);
                }
                tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
        })
    }

    fn delete(
        &self,
        queue: &QueueHandle,
        receipt_token: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>> {
        let queue_name = queue.name.clone();
        let receipt_token = receipt_token.to_string();
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM queue_messages WHERE queue_name = $1 AND receipt_token = $2")
                .bind(&queue_name)
                .bind(&receipt_token)
                .execute(&self.pool)
                .await
                .map_err(|e| QueueError::Transport(e.to_string()))?;

            if result.rows_affected() == 0 {
                return Err(QueueError::InvalidReceipt);
            }
            Ok(())
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
            sqlx::query(
                r"
                INSERT INTO queue_messages
                    (queue_name, message_id, body, available_at, retry_count, original_message_id, classification_category)
                VALUES ($1, $2, $3, now() + ($4 || ' seconds')::interval, $5, $6, $7)
                ",
            )
            .bind(&queue_name)
            .bind(&attributes.original_message_id)
            .bind(&body)
            .bind(i64::from(delay_s))
            .bind(attributes.retry_count as i32)
            .bind(&attributes.original_message_id)
            .bind(&attributes.classification_category)
            .execute(&self.pool)
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

            tracing::debug!(queue_name = %queue_name, delay_s, "message re-enqueued");
            Ok(())
        })
    }
}
