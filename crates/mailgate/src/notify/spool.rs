use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::sanitize::redact_path;

use super::queue::{QueueBackend, QueueError};

/// Durable queue that spools each message to its own file under `<spool>/<topic>/`.
///
/// File names sort by enqueue time, so a consumer reading the directory in
/// name order sees messages in the order they were sent.
pub struct SpoolQueue {
    topic: String,
    topic_directory: PathBuf,
    send_timeout: Duration,
    closed: AtomicBool,
}

impl SpoolQueue {
    pub fn new(spool_directory: impl AsRef<Path>, topic: &str, send_timeout: Duration) -> Self {
        Self {
            topic: topic.to_string(),
            topic_directory: spool_directory.as_ref().join(topic),
            send_timeout,
            closed: AtomicBool::new(false),
        }
    }

    pub fn topic_directory(&self) -> &Path {
        &self.topic_directory
    }

    async fn write_message(&self, body: &[u8]) -> Result<PathBuf, std::io::Error> {
        tokio::fs::create_dir_all(&self.topic_directory).await?;

        let id = Uuid::new_v4();
        let name = format!("{}-{}.json", Utc::now().format("%Y%m%dT%H%M%S%.6fZ"), id);
        let temp = self.topic_directory.join(format!(".{}.tmp", id));
        let target = self.topic_directory.join(name);

        tokio::fs::write(&temp, body).await?;
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }
        Ok(target)
    }
}

#[async_trait]
impl QueueBackend for SpoolQueue {
    async fn send(&self, body: Vec<u8>) -> Result<(), QueueError> {
        if self.is_closed() {
            error!(topic = %self.topic, "Send on a topic that was already closed");
            return Err(QueueError::Communication("topic is closed".to_string()));
        }

        match tokio::time::timeout(self.send_timeout, self.write_message(&body)).await {
            Ok(Ok(path)) => {
                debug!(topic = %self.topic, file = %redact_path(&path), "Spooled message");
                Ok(())
            }
            Ok(Err(e)) => Err(QueueError::Communication(format!(
                "failed to spool message in '{}': {}",
                self.topic_directory.display(),
                e
            ))),
            Err(_) => Err(QueueError::Timeout {
                topic: self.topic.clone(),
                timeout_ms: self.send_timeout.as_millis() as u64,
            }),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn topic_name(&self) -> &str {
        &self.topic
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
