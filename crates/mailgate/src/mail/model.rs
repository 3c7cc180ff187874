//! Mailbox-side data: message summaries as fetched from the transport.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use chrono::{DateTime, Utc};

/// Mailbox unique id of a message.
///
/// Only meaningful within one mailbox instantiation (UIDVALIDITY epoch); never
/// use it as a cross-session or global key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageUid(pub u32);

impl fmt::Display for MessageUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bitset of system flags carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct MessageFlags(u8);

impl MessageFlags {
    pub const NONE: Self = Self(0);
    pub const SEEN: Self = Self(1);
    pub const ANSWERED: Self = Self(1 << 1);
    pub const FLAGGED: Self = Self(1 << 2);
    pub const DELETED: Self = Self(1 << 3);
    pub const DRAFT: Self = Self(1 << 4);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// IMAP system flag names, e.g. `\Seen \Deleted`.
    pub fn to_imap_list(self) -> String {
        [
            (Self::SEEN, "\\Seen"),
            (Self::ANSWERED, "\\Answered"),
            (Self::FLAGGED, "\\Flagged"),
            (Self::DELETED, "\\Deleted"),
            (Self::DRAFT, "\\Draft"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(" ")
    }
}

impl BitOr for MessageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MessageFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Range of unique ids to fetch. `end: None` means "up to the newest message".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UidRange {
    pub start: u32,
    pub end: Option<u32>,
}

impl UidRange {
    /// Every message currently in the mailbox.
    pub fn all() -> Self {
        Self { start: 1, end: None }
    }

    /// IMAP sequence-set syntax.
    pub fn to_sequence_set(self) -> String {
        match self.end {
            Some(end) => format!("{}:{}", self.start, end),
            None => format!("{}:*", self.start),
        }
    }
}

/// Envelope projection of a message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    /// Sender addresses (bare `local@domain`).
    pub from: Vec<String>,
    pub subject: Option<String>,
    pub sent: Option<DateTime<Utc>>,
}

/// Metadata for one attachment within a message's structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDescriptor {
    /// Position among the message's attachments, in transport-reported order.
    pub part: usize,
    /// MIME section path of the body part (`[2]`, `[1, 3]`), as used by IMAP `BODY[...]`.
    pub section: Vec<u32>,
    pub name: String,
    /// Size in bytes as reported by the transport. Zero means no content.
    pub size: u64,
    pub content_type: Option<String>,
}

impl AttachmentDescriptor {
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Dotted section specifier, e.g. `1.3`.
    pub fn section_spec(&self) -> String {
        self.section
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Metadata and structure of a remote message, fetched without the body.
///
/// An immutable snapshot taken once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageSummary {
    pub uid: MessageUid,
    pub flags: MessageFlags,
    pub envelope: Envelope,
    /// Attachments in transport-reported order.
    pub attachments: Vec<AttachmentDescriptor>,
}

impl MessageSummary {
    pub fn is_deleted(&self) -> bool {
        self.flags.contains(MessageFlags::DELETED)
    }
}
