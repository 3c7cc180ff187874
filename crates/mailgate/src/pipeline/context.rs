use chrono::{DateTime, Utc};

use crate::contract::EmailSummary;
use crate::mail::MessageSummary;

/// What happened to one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentOutcome {
    /// Zero-byte attachment; nothing was fetched or stored.
    NoContent { name: String },
    /// Stored under `name`; `published` is the notification result.
    Saved { name: String, published: bool },
    /// Persistence gave up. The attachment is left out of the tally.
    NotSaved,
}

/// Per-message tally built while a message is being handled.
pub struct MessageContext {
    pub email: EmailSummary,
    pub total: usize,
    /// Success markers: stored names and `<name>-NoContent` entries.
    pub saved: Vec<String>,
    /// Result of the most recently attempted publish.
    pub last_publish: Option<bool>,
}

impl MessageContext {
    pub fn new(summary: &MessageSummary, received_date: DateTime<Utc>) -> Self {
        Self {
            email: EmailSummary::from_message(summary, received_date),
            total: summary.attachments.len(),
            saved: Vec::new(),
            last_publish: None,
        }
    }

    pub fn record(&mut self, outcome: AttachmentOutcome) {
        match outcome {
            AttachmentOutcome::NoContent { name } => self.saved.push(format!("{}-NoContent", name)),
            AttachmentOutcome::Saved { name, published } => {
                self.saved.push(name);
                self.last_publish = Some(published);
            }
            AttachmentOutcome::NotSaved => {}
        }
    }

    /// Every attachment has a success marker and the last publish went through.
    ///
    /// Earlier publish failures are not considered. A message whose
    /// attachments were all empty never published, which counts as success.
    pub fn is_complete(&self) -> bool {
        self.saved.len() == self.total && self.last_publish.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::{Envelope, MessageFlags, MessageUid};

    fn context(total: usize) -> MessageContext {
        let summary = MessageSummary {
            uid: MessageUid(1),
            flags: MessageFlags::NONE,
            envelope: Envelope::default(),
            attachments: Vec::new(),
        };
        MessageContext {
            total,
            ..MessageContext::new(&summary, Utc::now())
        }
    }

    #[test]
    fn test_no_content_marker() {
        let mut ctx = context(1);
        ctx.record(AttachmentOutcome::NoContent {
            name: "C.txt".to_string(),
        });
        assert_eq!(ctx.saved, vec!["C.txt-NoContent"]);
        assert!(ctx.is_complete());
    }

    #[test]
    fn test_not_saved_blocks_completion() {
        let mut ctx = context(2);
        ctx.record(AttachmentOutcome::Saved {
            name: "A.txt".to_string(),
            published: true,
        });
        ctx.record(AttachmentOutcome::NotSaved);
        assert!(!ctx.is_complete());
    }

    #[test]
    fn test_only_last_publish_counts() {
        let mut ctx = context(2);
        ctx.record(AttachmentOutcome::Saved {
            name: "A.txt".to_string(),
            published: false,
        });
        ctx.record(AttachmentOutcome::Saved {
            name: "B.txt".to_string(),
            published: true,
        });
        assert!(ctx.is_complete());

        let mut ctx = context(2);
        ctx.record(AttachmentOutcome::Saved {
            name: "A.txt".to_string(),
            published: true,
        });
        ctx.record(AttachmentOutcome::Saved {
            name: "B.txt".to_string(),
            published: false,
        });
        assert!(!ctx.is_complete());
    }
}
