//! Projection of fetched headers and body structures onto message summaries.

use async_imap::imap_proto::BodyStructure;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use mail_parser::{Message, MessageParser};

use super::model::{Envelope, MessageFlags, MessageSummary, MessageUid};
use super::structure::attachments_of;
use super::transport::TransportError;

/// The pieces of one `FETCH` response a summary is built from.
#[derive(Debug, Clone, Copy)]
pub struct FetchedSummary<'a> {
    pub uid: MessageUid,
    pub flags: MessageFlags,
    pub header: Option<&'a [u8]>,
    pub structure: Option<&'a BodyStructure<'a>>,
}

/// Builds a summary from a message's header block and body structure.
///
/// Attachments are reported in MIME order and addressed by their position
/// among the message's attachments.
pub fn summarize(fetched: FetchedSummary<'_>) -> Result<MessageSummary, TransportError> {
    let uid = fetched.uid;
    let header = fetched.header.ok_or_else(|| TransportError::Parse {
        uid,
        reason: "no header in fetch response".to_string(),
    })?;
    let structure = fetched.structure.ok_or_else(|| TransportError::Parse {
        uid,
        reason: "no body structure in fetch response".to_string(),
    })?;
    let message = MessageParser::default()
        .parse_headers(header)
        .ok_or_else(|| TransportError::Parse {
            uid,
            reason: "not a valid RFC 5322 header".to_string(),
        })?;

    let attachments = attachments_of(structure);
    debug!(
        "Parsed message UID={} with {} attachment(s)",
        uid,
        attachments.len()
    );

    Ok(MessageSummary {
        uid,
        flags: fetched.flags,
        envelope: envelope_of(&message),
        attachments,
    })
}

/// Summarizes every fetched message, skipping the ones that do not parse.
///
/// A skipped message stays on the server untouched and is picked up again by
/// the next run.
pub fn summarize_all<'a>(
    fetched: impl IntoIterator<Item = FetchedSummary<'a>>,
) -> Vec<MessageSummary> {
    fetched
        .into_iter()
        .filter_map(|item| match summarize(item) {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("Skipping message UID={}: {}", item.uid, e);
                None
            }
        })
        .collect()
}

fn envelope_of(message: &Message<'_>) -> Envelope {
    let from = message
        .from()
        .map(|addresses| {
            addresses
                .iter()
                .filter_map(|addr| addr.address())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Envelope {
        from,
        subject: message.subject().map(str::to_string),
        sent: message
            .date()
            .and_then(|date| DateTime::<Utc>::from_timestamp(date.to_timestamp(), 0)),
    }
}
