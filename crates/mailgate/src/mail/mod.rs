//! Mailbox access: the transport contract, its IMAP implementation, and the
//! reconnecting session the pipeline drives.

pub mod imap;
pub mod model;
pub mod parser;
pub mod session;
pub mod structure;
pub mod transport;

pub use imap::ImapTransport;
pub use model::{
    AttachmentDescriptor, Envelope, MessageFlags, MessageSummary, MessageUid, UidRange,
};
pub use session::{MailboxSession, MailboxSettings};
pub use transport::{
    classify_transport_fault, FolderAccess, MailTransport, SecurityMode, TransportError,
};
