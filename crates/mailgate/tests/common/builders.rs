//! Builders for message summaries and wired-up pipelines.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use secrecy::SecretString;

use mailgate::mail::{
    AttachmentDescriptor, Envelope, MailboxSession, MailboxSettings, MessageFlags, MessageSummary,
    MessageUid, SecurityMode,
};
use mailgate::notify::NotificationPublisher;
use mailgate::pipeline::{MailIngestionPipeline, PipelineConfig};
use mailgate::storage::AttachmentStore;
use mailgate::{CancelSignal, RetryPolicy};

use super::harness::{MemoryQueue, MemoryStorage, ScriptedTransport};

/// Builder for `MessageSummary` instances.
pub struct MessageBuilder {
    uid: u32,
    flags: MessageFlags,
    from: Vec<String>,
    subject: Option<String>,
    attachments: Vec<AttachmentDescriptor>,
    bodies: Vec<Vec<u8>>,
}

impl MessageBuilder {
    pub fn new(uid: u32) -> Self {
        Self {
            uid,
            flags: MessageFlags::NONE,
            from: vec!["reports@example.com".to_string()],
            subject: Some(format!("Daily stats {}", uid)),
            attachments: Vec::new(),
            bodies: Vec::new(),
        }
    }

    pub fn flags(mut self, flags: MessageFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    /// Adds an attachment whose reported size matches `body`.
    pub fn attachment(mut self, name: &str, body: &[u8]) -> Self {
        let part = self.attachments.len();
        self.attachments.push(AttachmentDescriptor {
            part,
            section: vec![part as u32 + 2],
            name: name.to_string(),
            size: body.len() as u64,
            content_type: None,
        });
        self.bodies.push(body.to_vec());
        self
    }

    pub fn build(self) -> (MessageSummary, Vec<Vec<u8>>) {
        let summary = MessageSummary {
            uid: MessageUid(self.uid),
            flags: self.flags,
            envelope: Envelope {
                from: self.from,
                subject: self.subject,
                sent: Utc.with_ymd_and_hms(2024, 3, 1, 6, 30, 0).single(),
            },
            attachments: self.attachments,
        };
        (summary, self.bodies)
    }

    /// Adds the message to `transport`'s mailbox.
    pub fn add_to(self, transport: ScriptedTransport) -> ScriptedTransport {
        let (summary, bodies) = self.build();
        transport.with_message(summary, bodies)
    }
}

pub fn settings() -> MailboxSettings {
    MailboxSettings {
        host: "imap.example.com".to_string(),
        port: 993,
        security: SecurityMode::Tls,
        username: "ingest@example.com".to_string(),
        password: SecretString::from("hunter2".to_string()),
        folder: "INBOX".to_string(),
    }
}

/// Retry budgets without backoff so tests run instantly.
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        reconnect_policy: RetryPolicy::with_retries(2),
        storage_policy: RetryPolicy::with_retries(2),
        queue_policy: RetryPolicy::with_retries(2),
        invocation_policy: RetryPolicy::once(),
    }
}

/// A pipeline plus handles on every double it was built from.
pub struct Fixture {
    pub transport: ScriptedTransport,
    pub storage: Arc<MemoryStorage>,
    pub queue: Arc<MemoryQueue>,
    pub cancel: CancelSignal,
    pub config: PipelineConfig,
}

impl Fixture {
    pub fn new(transport: ScriptedTransport) -> Self {
        Self {
            transport,
            storage: MemoryStorage::new(),
            queue: MemoryQueue::new(),
            cancel: CancelSignal::new(),
            config: fast_config(),
        }
    }

    pub fn store(&self) -> AttachmentStore {
        AttachmentStore::new(self.storage.clone(), self.config.storage_policy)
    }

    pub fn publisher(&self) -> NotificationPublisher {
        NotificationPublisher::new(self.queue.clone(), self.config.queue_policy)
    }

    pub fn session(&self) -> MailboxSession<ScriptedTransport> {
        MailboxSession::new(self.transport.clone(), settings(), self.cancel.clone())
    }

    pub fn pipeline(&self) -> MailIngestionPipeline<ScriptedTransport> {
        MailIngestionPipeline::new(
            self.transport.clone(),
            settings(),
            self.cancel.clone(),
            self.store(),
            self.publisher(),
            self.config,
        )
    }
}
