//! Contracts shared with the downstream file pipeline.
//!
//! These types define the JSON notification payload, so their serialized
//! field names are part of the wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mail::MessageSummary;

/// The parts of a message the downstream pipeline needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmailSummary {
    /// When the message was fetched for processing.
    pub received_date: DateTime<Utc>,
    /// Mailbox unique id, as a string. Not stable across mailbox instantiations.
    pub unique_id: String,
    pub from: Vec<String>,
    pub sent: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subject: String,
}

impl EmailSummary {
    pub fn from_message(message: &MessageSummary, received_date: DateTime<Utc>) -> Self {
        Self {
            received_date,
            unique_id: message.uid.to_string(),
            from: message.envelope.from.clone(),
            sent: message.envelope.sent,
            subject: message.envelope.subject.clone().unwrap_or_default(),
        }
    }
}

/// Storage information for one attachment.
///
/// Borrows the summary of the message it came from; it never owns it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttachmentSummary<'a> {
    /// Fresh per attachment.
    pub id: String,
    pub file_name: String,
    /// When the attachment was saved to storage.
    pub created: DateTime<Utc>,
    /// Storage locator; empty until persistence succeeds.
    pub file_url: String,
    pub email_summary: &'a EmailSummary,
}

impl<'a> AttachmentSummary<'a> {
    pub fn new(file_name: impl Into<String>, email_summary: &'a EmailSummary) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: file_name.into(),
            created: Utc::now(),
            file_url: String::new(),
            email_summary,
        }
    }

    /// The name the attachment is stored under.
    ///
    /// This is the plain file name, so unrelated messages carrying attachments
    /// with the same name overwrite each other in storage.
    pub fn storage_file_name(&self) -> &str {
        &self.file_name
    }

    pub fn is_persisted(&self) -> bool {
        !self.file_url.is_empty()
    }

    pub fn mark_persisted(&mut self, locator: String) {
        self.file_url = locator;
        self.created = Utc::now();
    }
}
