use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::SendTimeoutError};

use super::queue::{QueueBackend, QueueError};

/// In-process queue over a bounded channel, for embedding the pipeline next to
/// its consumer.
pub struct ChannelQueue {
    topic: String,
    sender: mpsc::Sender<Vec<u8>>,
    send_timeout: Duration,
    closed: AtomicBool,
}

impl ChannelQueue {
    /// Creates the queue and the receiving end its consumer reads from.
    pub fn new(
        topic: &str,
        capacity: usize,
        send_timeout: Duration,
    ) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let queue = Self {
            topic: topic.to_string(),
            sender,
            send_timeout,
            closed: AtomicBool::new(false),
        };
        (queue, receiver)
    }
}

#[async_trait]
impl QueueBackend for ChannelQueue {
    async fn send(&self, body: Vec<u8>) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Communication("topic is closed".to_string()));
        }

        self.sender
            .send_timeout(body, self.send_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => QueueError::Timeout {
                    topic: self.topic.clone(),
                    timeout_ms: self.send_timeout.as_millis() as u64,
                },
                SendTimeoutError::Closed(_) => {
                    QueueError::Communication("consumer has gone away".to_string())
                }
            })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.sender.is_closed()
    }

    fn topic_name(&self) -> &str {
        &self.topic
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
