use std::time::Duration;

use async_trait::async_trait;

use crate::domain::JobFields;

/// A message handed to this consumer by the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    pub id: String,
    pub fields: JobFields,
}

/// Competing-consumer broker contract.
///
/// Delivery is at-least-once: a message stays pending for the group until it
/// is acknowledged, so everything built on top must tolerate redelivery.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Appends a message and returns its broker-assigned id.
    async fn enqueue(&self, topic: &str, fields: &[(String, String)]) -> Result<String, QueueError>;

    /// Returns up to `batch_size` messages never delivered to `group` before,
    /// creating the group on first use.
    async fn claim(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        batch_size: usize,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    /// Takes over messages that another consumer of `group` left unacknowledged
    /// for at least `min_idle`.
    async fn reclaim(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        batch_size: usize,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    async fn ack(&self, topic: &str, group: &str, ids: &[String]) -> Result<(), QueueError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
    #[error("consumer group error: {0}")]
    ConsumerGroup(String),
}
