//! The durable queue contract and its fault classifiers.

use async_trait::async_trait;
use thiserror::Error;

use crate::retry::Fault;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Timed out sending to topic '{topic}' after {timeout_ms} ms")]
    Timeout { topic: String, timeout_ms: u64 },

    /// The broker could not be reached, or the topic is closed.
    #[error("Queue communication failure: {0}")]
    Communication(String),

    #[error("Queue broker is busy: {0}")]
    ServerBusy(String),

    #[error("Failed to serialize notification: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Queue rejected message: {0}")]
    Rejected(String),
}

/// Faults worth retrying after a failed publish.
pub fn classify_publish_fault(error: &QueueError) -> Fault {
    match error {
        QueueError::Timeout { .. } | QueueError::Communication(_) | QueueError::ServerBusy(_) => {
            Fault::Transient
        }
        _ => Fault::Fatal,
    }
}

/// Faults that keep a publish retry loop going. Only timeouts qualify.
pub fn classify_retry_publish_fault(error: &QueueError) -> Fault {
    match error {
        QueueError::Timeout { .. } => Fault::Transient,
        _ => Fault::Fatal,
    }
}

/// A topic that accepts raw message bodies.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    async fn send(&self, body: Vec<u8>) -> Result<(), QueueError>;

    fn is_closed(&self) -> bool;

    fn topic_name(&self) -> &str;

    /// Stops accepting messages. Later sends fail with a communication fault.
    async fn close(&self) -> Result<(), QueueError>;
}
