pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod invoke;
pub mod report;
pub mod runner;

pub use config::{mailbox_settings, PipelineConfig};
pub use context::{AttachmentOutcome, MessageContext};
pub use error::PipelineError;
pub use handler::{MessageHandler, MessageOutcome};
pub use invoke::{invoke_with_retries, Jitter};
pub use report::{FailureNotice, RunReport};
pub use runner::MailIngestionPipeline;
