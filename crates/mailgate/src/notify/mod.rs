//! Downstream notification of saved attachments.

pub mod channel;
pub mod message;
pub mod publisher;
pub mod queue;
pub mod spool;

pub use channel::ChannelQueue;
pub use message::NotificationMessage;
pub use publisher::NotificationPublisher;
pub use queue::{classify_publish_fault, classify_retry_publish_fault, QueueBackend, QueueError};
pub use spool::SpoolQueue;
