use crate::contract::AttachmentSummary;

use super::queue::QueueError;

/// A serialized [`AttachmentSummary`], ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    /// Id of the attachment the message announces.
    pub attachment_id: String,
    pub body: Vec<u8>,
}

impl NotificationMessage {
    pub fn from_summary(summary: &AttachmentSummary<'_>) -> Result<Self, QueueError> {
        Ok(Self {
            attachment_id: summary.id.clone(),
            body: serde_json::to_vec(summary)?,
        })
    }
}
