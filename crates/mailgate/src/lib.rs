pub mod cancel;
pub mod config;
pub mod contract;
pub mod error;
pub mod mail;
pub mod notify;
pub mod pipeline;
pub mod retry;
pub mod sanitize;
pub mod secrets;
pub mod storage;

pub use cancel::CancelSignal;
pub use config::{load_config, Config};
pub use contract::{AttachmentSummary, EmailSummary};
pub use error::{ConfigError, MailgateError, Result};
pub use mail::{ImapTransport, MailTransport, MailboxSession, MailboxSettings, TransportError};
pub use notify::{NotificationMessage, NotificationPublisher, QueueBackend, QueueError};
pub use pipeline::{
    invoke_with_retries, MailIngestionPipeline, MessageHandler, PipelineConfig, PipelineError,
    RunReport,
};
pub use retry::{Backoff, Fault, RetryError, RetryPolicy};
pub use secrets::{SecretError, SecretSource};
pub use storage::{AttachmentStore, StorageBackend, StorageError};
