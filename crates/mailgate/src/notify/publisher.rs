use std::sync::Arc;

use tracing::{error, info, warn};

use crate::contract::AttachmentSummary;
use crate::retry::{Fault, RetryError, RetryPolicy};

use super::message::NotificationMessage;
use super::queue::{classify_publish_fault, classify_retry_publish_fault, QueueBackend, QueueError};

/// Announces saved attachments on the downstream topic.
pub struct NotificationPublisher {
    queue: Arc<dyn QueueBackend>,
    retry_policy: RetryPolicy,
}

impl NotificationPublisher {
    /// `retry_policy` bounds [`retry_publish`](Self::retry_publish).
    pub fn new(queue: Arc<dyn QueueBackend>, retry_policy: RetryPolicy) -> Self {
        Self {
            queue,
            retry_policy,
        }
    }

    pub fn topic_name(&self) -> &str {
        self.queue.topic_name()
    }

    pub async fn send(&self, message: &NotificationMessage) -> Result<(), QueueError> {
        self.queue.send(message.body.clone()).await
    }

    /// Publishes one notification for `summary`. Never fails loudly: the
    /// outcome is the returned flag, and failures are logged with the payload
    /// for remediation.
    pub async fn publish(&self, summary: &AttachmentSummary<'_>) -> bool {
        let fault = match NotificationMessage::from_summary(summary) {
            Ok(message) => match self.send(&message).await {
                Ok(()) => return true,
                Err(fault) => fault,
            },
            Err(fault) => fault,
        };

        if classify_publish_fault(&fault) == Fault::Transient
            && self.retry_publish(&fault, summary).await
        {
            return true;
        }

        error!(
            topic = %self.topic_name(),
            attachment_id = %summary.id,
            file_name = %summary.file_name,
            file_url = %summary.file_url,
            error = %fault,
            "Failed to send attachment notification, attachment may not be processed"
        );
        false
    }

    /// Retries a publish that failed with `fault`, rebuilding the message
    /// every attempt. Timeouts consume the retry budget; any other fault ends
    /// the loop.
    pub async fn retry_publish(&self, fault: &QueueError, summary: &AttachmentSummary<'_>) -> bool {
        info!(
            topic = %self.topic_name(),
            attachment_id = %summary.id,
            error = %fault,
            "Retrying attachment notification"
        );

        let result = self
            .retry_policy
            .run(
                |attempt| async move {
                    let message = NotificationMessage::from_summary(summary)?;
                    let sent = self.send(&message).await;
                    if let Err(e) = &sent {
                        warn!(attempt, error = %e, "Notification retry attempt failed");
                    }
                    sent
                },
                classify_retry_publish_fault,
            )
            .await;

        match result {
            Ok(()) => {
                info!(topic = %self.topic_name(), "Notification retry succeeded");
                true
            }
            Err(RetryError::Exhausted { attempts, .. }) => {
                error!(
                    topic = %self.topic_name(),
                    attempts,
                    "Retries expired for topic, giving up"
                );
                false
            }
            Err(RetryError::Fatal { error, .. }) => {
                error!(
                    topic = %self.topic_name(),
                    error = %error,
                    "Giving up on notification retry"
                );
                false
            }
        }
    }

    /// Closes the underlying queue. Closing twice only logs.
    pub async fn close(&self) {
        if self.queue.is_closed() {
            error!(topic = %self.topic_name(), "Queue was already closed");
            return;
        }
        if let Err(e) = self.queue.close().await {
            error!(topic = %self.topic_name(), error = %e, "Failed to close queue");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::EmailSummary;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Step {
        Ok,
        Timeout,
        Busy,
        Reject,
    }

    struct ScriptedQueue {
        script: Mutex<VecDeque<Step>>,
        calls: AtomicU32,
        closed: AtomicBool,
    }

    impl ScriptedQueue {
        fn new(script: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
                closed: AtomicBool::new(false),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueueBackend for ScriptedQueue {
        async fn send(&self, _body: Vec<u8>) -> Result<(), QueueError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Ok);
            match step {
                Step::Ok => Ok(()),
                Step::Timeout => Err(QueueError::Timeout {
                    topic: "attachments".to_string(),
                    timeout_ms: 10,
                }),
                Step::Busy => Err(QueueError::ServerBusy("throttled".to_string())),
                Step::Reject => Err(QueueError::Rejected("too large".to_string())),
            }
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        fn topic_name(&self) -> &str {
            "attachments"
        }

        async fn close(&self) -> Result<(), QueueError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn email() -> EmailSummary {
        EmailSummary {
            received_date: Utc::now(),
            unique_id: "9".to_string(),
            from: vec![],
            sent: None,
            subject: String::new(),
        }
    }

    fn timeout() -> QueueError {
        QueueError::Timeout {
            topic: "attachments".to_string(),
            timeout_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_publish_success_is_single_send() {
        let queue = ScriptedQueue::new(vec![Step::Ok]);
        let publisher = NotificationPublisher::new(queue.clone(), RetryPolicy::with_retries(3));
        let email = email();

        assert!(publisher.publish(&AttachmentSummary::new("A.txt", &email)).await);
        assert_eq!(queue.calls(), 1);
    }

    #[tokio::test]
    async fn test_publish_retries_transient_fault() {
        let queue = ScriptedQueue::new(vec![Step::Busy, Step::Timeout, Step::Ok]);
        let publisher = NotificationPublisher::new(queue.clone(), RetryPolicy::with_retries(3));
        let email = email();

        assert!(publisher.publish(&AttachmentSummary::new("A.txt", &email)).await);
        assert_eq!(queue.calls(), 3);
    }

    #[tokio::test]
    async fn test_publish_does_not_retry_fatal_fault() {
        let queue = ScriptedQueue::new(vec![Step::Reject, Step::Ok]);
        let publisher = NotificationPublisher::new(queue.clone(), RetryPolicy::with_retries(3));
        let email = email();

        assert!(!publisher.publish(&AttachmentSummary::new("A.txt", &email)).await);
        assert_eq!(queue.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_publish_timeouts_within_budget_then_success() {
        let queue = ScriptedQueue::new(vec![Step::Timeout, Step::Timeout, Step::Ok]);
        let publisher = NotificationPublisher::new(queue.clone(), RetryPolicy::with_retries(2));
        let email = email();
        let summary = AttachmentSummary::new("A.txt", &email);

        assert!(publisher.retry_publish(&timeout(), &summary).await);
        assert_eq!(queue.calls(), 3);
    }

    #[tokio::test]
    async fn test_retry_publish_gives_up_when_budget_spent() {
        let queue = ScriptedQueue::new(vec![Step::Timeout; 10]);
        let publisher = NotificationPublisher::new(queue.clone(), RetryPolicy::with_retries(2));
        let email = email();
        let summary = AttachmentSummary::new("A.txt", &email);

        assert!(!publisher.retry_publish(&timeout(), &summary).await);
        assert_eq!(queue.calls(), 3);
    }

    #[tokio::test]
    async fn test_retry_publish_stops_on_non_timeout_fault() {
        let queue = ScriptedQueue::new(vec![Step::Busy, Step::Ok]);
        let publisher = NotificationPublisher::new(queue.clone(), RetryPolicy::with_retries(5));
        let email = email();
        let summary = AttachmentSummary::new("A.txt", &email);

        assert!(!publisher.retry_publish(&timeout(), &summary).await);
        assert_eq!(queue.calls(), 1);
    }

    #[tokio::test]
    async fn test_close_twice_is_noop() {
        let queue = ScriptedQueue::new(vec![]);
        let publisher = NotificationPublisher::new(queue.clone(), RetryPolicy::once());

        publisher.close().await;
        publisher.close().await;

        assert!(queue.is_closed());
    }
}
