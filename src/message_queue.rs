use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum MessageQueueError {
    #[error("Queue is full")]
    QueueFull,
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

/// Envelope for queued items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub topic: String,
    pub payload: serde_json::Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            payload,
            timestamp: chrono::Utc::now(),
            retry_count: 0,
            max_retries: 3,
        }
    }
}

/// Message queue abstraction over the configured backend.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn publish(&self, message: Message) -> Result<(), MessageQueueError>;
    async fn subscribe(&self, topic: &str) -> Result<Option<Message>, MessageQueueError>;
    async fn ack(&self, message_id: &Uuid) -> Result<(), MessageQueueError>;
    async fn nack(&self, message_id: &Uuid) -> Result<(), MessageQueueError>;
}

/// Publishes with bounded fixed-delay retries. Used where delivery is
/// best-effort: the final error is returned for logging, never propagated
/// into request paths.
pub async fn publish_with_retry(
    queue: &dyn MessageQueue,
    message: Message,
    max_attempts: u32,
    delay: Duration,
) -> Result<(), MessageQueueError> {
    let mut attempt = 1;
    loop {
        match queue.publish(message.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < max_attempts => {
                warn!(
                    topic = %message.topic,
                    attempt,
                    error = %e,
                    "publish failed, retrying"
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// In-memory backend, one bounded FIFO per topic.
#[derive(Debug)]
pub struct InMemoryMessageQueue {
    queues: Arc<Mutex<HashMap<String, VecDeque<Message>>>>,
    max_size: usize,
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self::with_max_size(1000)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            max_size,
        }
    }
}

impl Default for InMemoryMessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn publish(&self, message: Message) -> Result<(), MessageQueueError> {
        let mut queues = self.queues.lock().unwrap();
        let queue = queues.entry(message.topic.clone()).or_default();
        if queue.len() >= self.max_size {
            return Err(MessageQueueError::QueueFull);
        }
        queue.push_back(message);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Option<Message>, MessageQueueError> {
        let mut queues = self.queues.lock().unwrap();
        Ok(queues.get_mut(topic).and_then(|q| q.pop_front()))
    }

    async fn ack(&self, _message_id: &Uuid) -> Result<(), MessageQueueError> {
        Ok(())
    }

    async fn nack(&self, _message_id: &Uuid) -> Result<(), MessageQueueError> {
        Ok(())
    }
}

/// Redis-backed queue using per-topic lists under a key namespace.
pub struct RedisMessageQueue {
    conn: redis::aio::ConnectionManager,
    namespace: String,
}

impl RedisMessageQueue {
    pub async fn connect(
        redis_url: &str,
        namespace: impl Into<String>,
    ) -> Result<Self, MessageQueueError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| MessageQueueError::ConnectionError(e.to_string()))?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| MessageQueueError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn,
            namespace: namespace.into(),
        })
    }

    fn key(&self, topic: &str) -> String {
        format!("{}:{}", self.namespace, topic)
    }
}

#[async_trait]
impl MessageQueue for RedisMessageQueue {
    async fn publish(&self, message: Message) -> Result<(), MessageQueueError> {
        let body = serde_json::to_string(&message)
            .map_err(|e| MessageQueueError::SerializationError(e.to_string()))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .lpush(self.key(&message.topic), body)
            .await
            .map_err(|e| MessageQueueError::ConnectionError(e.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Option<Message>, MessageQueueError> {
        let mut conn = self.conn.clone();
        let body: Option<String> = conn
            .rpop(self.key(topic), None)
            .await
            .map_err(|e| MessageQueueError::ConnectionError(e.to_string()))?;
        match body {
            Some(b) => {
                let message = serde_json::from_str(&b)
                    .map_err(|e| MessageQueueError::SerializationError(e.to_string()))?;
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    async fn ack(&self, _message_id: &Uuid) -> Result<(), MessageQueueError> {
        // RPOP already removed the message.
        Ok(())
    }

    async fn nack(&self, _message_id: &Uuid) -> Result<(), MessageQueueError> {
        Ok(())
    }
}

/// Capture-only queue for asserting what got published in tests.
pub struct MockMessageQueue {
    published: Arc<Mutex<Vec<Message>>>,
    fail_times: Arc<Mutex<u32>>,
}

impl MockMessageQueue {
    pub fn new() -> Self {
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            fail_times: Arc::new(Mutex::new(0)),
        }
    }

    /// Makes the next `n` publish calls fail.
    pub fn fail_next(&self, n: u32) {
        *self.fail_times.lock().unwrap() = n;
    }

    pub fn published_messages(&self) -> Vec<Message> {
        self.published.lock().unwrap().clone()
    }
}

impl Default for MockMessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for MockMessageQueue {
    async fn publish(&self, message: Message) -> Result<(), MessageQueueError> {
        {
            let mut remaining = self.fail_times.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(MessageQueueError::ConnectionError(
                    "injected failure".into(),
                ));
            }
        }
        self.published.lock().unwrap().push(message);
        Ok(())
    }

    async fn subscribe(&self, _topic: &str) -> Result<Option<Message>, MessageQueueError> {
        Ok(None)
    }

    async fn ack(&self, _message_id: &Uuid) -> Result<(), MessageQueueError> {
        Ok(())
    }

    async fn nack(&self, _message_id: &Uuid) -> Result<(), MessageQueueError> {
        Ok(())
    }
}
