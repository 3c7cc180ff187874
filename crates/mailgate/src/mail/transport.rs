//! The remote mailbox contract and its error taxonomy.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::Fault;

use super::model::{AttachmentDescriptor, MessageFlags, MessageSummary, MessageUid, UidRange};

/// How the connection to the mail server is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    /// Implicit TLS (IMAPS).
    #[default]
    Tls,
    /// Plain text connection.
    None,
}

/// Access mode for opening the mailbox folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderAccess {
    ReadOnly,
    ReadWrite,
}

/// Errors raised by a mail transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The server sent something unexpected; the session is usually unusable afterwards.
    #[error("Mail protocol error: {0}")]
    Protocol(String),

    #[error("Mail connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mail transport is not connected")]
    NotConnected,

    #[error("Mail transport is not authenticated")]
    NotAuthenticated,

    #[error("TLS error: {0}")]
    Tls(String),

    /// The server answered NO or BAD to a well-formed command.
    #[error("Mail server rejected command: {0}")]
    Rejected(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Mail folder '{0}' not found")]
    FolderNotFound(String),

    #[error("Message {uid} has no body part {part} ('{name}')")]
    PartNotFound {
        uid: MessageUid,
        part: usize,
        name: String,
    },

    #[error("Message {0} not found")]
    MessageNotFound(MessageUid),

    #[error("Failed to parse message {uid}: {reason}")]
    Parse { uid: MessageUid, reason: String },

    #[error("Invalid transport configuration: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl TransportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }
}

impl From<async_native_tls::Error> for TransportError {
    fn from(err: async_native_tls::Error) -> Self {
        TransportError::Tls(err.to_string())
    }
}

/// Protocol, I/O, not-connected and not-authenticated faults are cured by
/// reconnecting; everything else is fatal for the current attempt.
pub fn classify_transport_fault(error: &TransportError) -> Fault {
    match error {
        TransportError::Protocol(_)
        | TransportError::Io(_)
        | TransportError::NotConnected
        | TransportError::NotAuthenticated => Fault::Transient,
        _ => Fault::Fatal,
    }
}

/// Operations against the remote mail server.
///
/// Implementations are not safe for concurrent command issuance; callers hold
/// `&mut self` for every call. Cancellation is applied by the caller
/// ([`MailboxSession`](super::session::MailboxSession)), which drops in-flight
/// futures.
#[async_trait]
pub trait MailTransport: Send {
    async fn connect(
        &mut self,
        host: &str,
        port: u16,
        security: SecurityMode,
    ) -> Result<(), TransportError>;

    async fn authenticate(
        &mut self,
        username: &str,
        password: &SecretString,
    ) -> Result<(), TransportError>;

    async fn open_mailbox(
        &mut self,
        folder: &str,
        access: FolderAccess,
    ) -> Result<(), TransportError>;

    /// Fetches unique id, flags, envelope and attachment structure for every
    /// message in `range`, in server order.
    async fn fetch_summaries(
        &mut self,
        range: UidRange,
    ) -> Result<Vec<MessageSummary>, TransportError>;

    /// Downloads and decodes one attachment.
    async fn get_body_part(
        &mut self,
        uid: MessageUid,
        descriptor: &AttachmentDescriptor,
    ) -> Result<Vec<u8>, TransportError>;

    async fn add_flags(
        &mut self,
        uid: MessageUid,
        flags: MessageFlags,
        silent: bool,
    ) -> Result<(), TransportError>;

    /// Permanently removes every message flagged Deleted.
    async fn expunge(&mut self) -> Result<(), TransportError>;

    /// Closes the connection; `quit` sends a polite logout first.
    async fn disconnect(&mut self, quit: bool) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    fn is_authenticated(&self) -> bool;
}
