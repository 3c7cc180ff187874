//! Per-message decisions: skip, extract, persist, notify, flag for deletion.

use chrono::Utc;
use tracing::{error, info, info_span, warn, Instrument};

use crate::contract::{AttachmentSummary, EmailSummary};
use crate::mail::{
    AttachmentDescriptor, MailTransport, MailboxSession, MessageFlags, MessageSummary,
    TransportError,
};
use crate::notify::NotificationPublisher;
use crate::sanitize::mask_address;
use crate::storage::AttachmentStore;

use super::context::{AttachmentOutcome, MessageContext};

/// What [`MessageHandler::process`] did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Already flagged Deleted by an earlier run.
    Skipped,
    /// No attachments; flagged Deleted.
    FlaggedNoAttachments,
    /// Every attachment accounted for; flagged Deleted.
    Completed { saved: Vec<String> },
    /// Left on the server for the next run.
    Incomplete { saved: Vec<String> },
}

/// Handles one message at a time against the run's session.
pub struct MessageHandler<'a> {
    store: &'a AttachmentStore,
    publisher: &'a NotificationPublisher,
}

impl<'a> MessageHandler<'a> {
    pub fn new(store: &'a AttachmentStore, publisher: &'a NotificationPublisher) -> Self {
        Self { store, publisher }
    }

    /// Processes `summary`. Transport errors from fetching attachment content
    /// propagate to the caller; flagging failures are only logged, except
    /// cancellation.
    pub async fn process<T: MailTransport>(
        &self,
        session: &mut MailboxSession<T>,
        summary: &MessageSummary,
    ) -> Result<MessageOutcome, TransportError> {
        let span = info_span!(
            "process_message",
            uid = %summary.uid,
            subject = summary.envelope.subject.as_deref().unwrap_or(""),
        );
        self.process_inner(session, summary).instrument(span).await
    }

    async fn process_inner<T: MailTransport>(
        &self,
        session: &mut MailboxSession<T>,
        summary: &MessageSummary,
    ) -> Result<MessageOutcome, TransportError> {
        if summary.is_deleted() {
            info!(
                from = %sender_of(summary),
                sent = ?summary.envelope.sent,
                "Message already flagged Deleted, skipping"
            );
            return Ok(MessageOutcome::Skipped);
        }

        let mut ctx = MessageContext::new(summary, Utc::now());
        info!(
            from = %sender_of(summary),
            attachments = ctx.total,
            "Processing message"
        );

        if summary.attachments.is_empty() {
            error!("No attachments found in message, flagging for delete");
            self.flag_deleted(session, summary).await?;
            return Ok(MessageOutcome::FlaggedNoAttachments);
        }

        for descriptor in &summary.attachments {
            let outcome = self
                .step_handle_attachment(session, summary, &ctx.email, descriptor)
                .await?;
            ctx.record(outcome);
        }

        if ctx.is_complete() {
            info!(
                saved = ctx.saved.len(),
                "All attachments saved, flagging message for delete"
            );
            self.flag_deleted(session, summary).await?;
            Ok(MessageOutcome::Completed { saved: ctx.saved })
        } else {
            error!(
                saved = %ctx.saved.join(","),
                "Failed to save all attachments, message will not be deleted from server"
            );
            Ok(MessageOutcome::Incomplete { saved: ctx.saved })
        }
    }

    async fn step_handle_attachment<T: MailTransport>(
        &self,
        session: &mut MailboxSession<T>,
        summary: &MessageSummary,
        email: &EmailSummary,
        descriptor: &AttachmentDescriptor,
    ) -> Result<AttachmentOutcome, TransportError> {
        if descriptor.is_empty() {
            warn!(file_name = %descriptor.name, "Attachment contains no content");
            return Ok(AttachmentOutcome::NoContent {
                name: descriptor.name.clone(),
            });
        }

        let mut attachment = AttachmentSummary::new(descriptor.name.as_str(), email);
        let bytes = session.get_body_part(summary.uid, descriptor).await?;

        let Some(locator) = self.store.persist_with_retry(&bytes, &attachment).await else {
            return Ok(AttachmentOutcome::NotSaved);
        };
        attachment.mark_persisted(locator);

        let published = self.publisher.publish(&attachment).await;
        Ok(AttachmentOutcome::Saved {
            name: attachment.storage_file_name().to_string(),
            published,
        })
    }

    async fn flag_deleted<T: MailTransport>(
        &self,
        session: &mut MailboxSession<T>,
        summary: &MessageSummary,
    ) -> Result<(), TransportError> {
        match session
            .add_flags(summary.uid, MessageFlags::DELETED, false)
            .await
        {
            Ok(()) => Ok(()),
            Err(TransportError::Cancelled) => Err(TransportError::Cancelled),
            Err(e) => {
                error!(error = %e, "Failed to flag message Deleted");
                Ok(())
            }
        }
    }
}

fn sender_of(summary: &MessageSummary) -> String {
    summary
        .envelope
        .from
        .first()
        .map(|address| mask_address(address))
        .unwrap_or_default()
}
