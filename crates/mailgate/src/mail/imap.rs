//! IMAP implementation of [`MailTransport`].

use std::net::{TcpStream, ToSocketAddrs};

use async_imap::error::Error as ImapError;
use async_imap::imap_proto::SectionPath;
use async_imap::types::{Fetch, Flag};
use async_imap::{Client, Session};
use async_native_tls::TlsConnector;
use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};

use super::model::{AttachmentDescriptor, MessageFlags, MessageSummary, MessageUid, UidRange};
use super::parser::{self, FetchedSummary};
use super::structure::decode_section;
use super::transport::{FolderAccess, MailTransport, SecurityMode, TransportError};

type AsyncTcpStream = async_io::Async<TcpStream>;
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;
type ImapSession = Session<TlsStream>;

/// Fetch items for a summary: headers and MIME structure, no bodies.
/// `BODY.PEEK` keeps `\Seen` untouched.
const SUMMARY_QUERY: &str = "(UID FLAGS BODYSTRUCTURE BODY.PEEK[HEADER])";

/// Fetch items for a single attachment section.
fn section_query(descriptor: &AttachmentDescriptor) -> String {
    format!("(UID BODYSTRUCTURE BODY.PEEK[{}])", descriptor.section_spec())
}

enum ImapState {
    Disconnected,
    Connected(Client<TlsStream>),
    Authenticated {
        session: ImapSession,
        folder: Option<String>,
    },
}

/// Mail transport speaking IMAP over implicit TLS.
pub struct ImapTransport {
    state: ImapState,
}

impl ImapTransport {
    pub fn new() -> Self {
        Self {
            state: ImapState::Disconnected,
        }
    }

    fn session_mut(&mut self) -> Result<&mut ImapSession, TransportError> {
        match &mut self.state {
            ImapState::Authenticated {
                session,
                folder: Some(_),
            } => Ok(session),
            ImapState::Authenticated { folder: None, .. } => Err(TransportError::NotAuthenticated),
            ImapState::Connected(_) => Err(TransportError::NotAuthenticated),
            ImapState::Disconnected => Err(TransportError::NotConnected),
        }
    }

    /// Converts a protocol-level failure, dropping the session when the
    /// connection itself is gone.
    fn settle<T>(&mut self, result: Result<T, ImapError>) -> Result<T, TransportError> {
        result.map_err(|e| {
            let error = map_imap_error(e);
            if matches!(error, TransportError::Io(_)) {
                warn!("IMAP connection lost, dropping session: {}", error);
                self.state = ImapState::Disconnected;
            }
            error
        })
    }
}

impl Default for ImapTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn map_imap_error(error: ImapError) -> TransportError {
    match error {
        ImapError::Io(e) => TransportError::Io(e),
        ImapError::ConnectionLost => TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionAborted,
            "connection lost",
        )),
        ImapError::No(msg) | ImapError::Bad(msg) => TransportError::Rejected(msg),
        other => TransportError::Protocol(other.to_string()),
    }
}

fn flags_of(fetch: &Fetch) -> MessageFlags {
    fetch.flags().fold(MessageFlags::NONE, |flags, flag| {
        flags
            | match flag {
                Flag::Seen => MessageFlags::SEEN,
                Flag::Answered => MessageFlags::ANSWERED,
                Flag::Flagged => MessageFlags::FLAGGED,
                Flag::Deleted => MessageFlags::DELETED,
                Flag::Draft => MessageFlags::DRAFT,
                _ => MessageFlags::NONE,
            }
    })
}

/// Collects a fetch stream. A response that fails to parse is logged and
/// skipped; a lost connection aborts the whole fetch.
async fn collect_fetches(
    session: &mut ImapSession,
    sequence_set: &str,
    query: &str,
) -> Result<Vec<Fetch>, ImapError> {
    let stream = session.uid_fetch(sequence_set, query).await?;
    futures_util::pin_mut!(stream);

    let mut fetches = Vec::new();
    while let Some(fetch) = stream.next().await {
        match fetch {
            Ok(fetch) => fetches.push(fetch),
            Err(e @ (ImapError::Io(_) | ImapError::ConnectionLost)) => return Err(e),
            Err(e) => warn!("Skipping unparseable IMAP response: {}", e),
        }
    }
    Ok(fetches)
}

async fn store_flags(
    session: &mut ImapSession,
    sequence_set: &str,
    command: &str,
) -> Result<(), ImapError> {
    let stream = session.uid_store(sequence_set, command).await?;
    futures_util::pin_mut!(stream);
    while let Some(update) = stream.next().await {
        update?;
    }
    Ok(())
}

async fn expunge_all(session: &mut ImapSession) -> Result<usize, ImapError> {
    let stream = session.expunge().await?;
    futures_util::pin_mut!(stream);

    let mut removed = 0;
    while let Some(seq) = stream.next().await {
        seq?;
        removed += 1;
    }
    Ok(removed)
}

#[async_trait]
impl MailTransport for ImapTransport {
    async fn connect(
        &mut self,
        host: &str,
        port: u16,
        security: SecurityMode,
    ) -> Result<(), TransportError> {
        if !matches!(self.state, ImapState::Disconnected) {
            debug!("Already connected to IMAP server");
            return Ok(());
        }

        if security == SecurityMode::None {
            return Err(TransportError::Config(
                "TLS is required for mailbox connections".to_string(),
            ));
        }

        info!("Connecting to IMAP server at {}:{}", host, port);

        let addr = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no address found for {}", host),
            ))
        })?;
        let tcp_stream = AsyncTcpStream::connect(addr).await?;
        let tls_stream = TlsConnector::new().connect(host, tcp_stream).await?;

        self.state = ImapState::Connected(Client::new(tls_stream));
        Ok(())
    }

    async fn authenticate(
        &mut self,
        username: &str,
        password: &SecretString,
    ) -> Result<(), TransportError> {
        match std::mem::replace(&mut self.state, ImapState::Disconnected) {
            ImapState::Disconnected => Err(TransportError::NotConnected),
            ImapState::Connected(client) => {
                match client.login(username, password.expose_secret()).await {
                    Ok(session) => {
                        info!("Authenticated to IMAP server");
                        self.state = ImapState::Authenticated {
                            session,
                            folder: None,
                        };
                        Ok(())
                    }
                    Err((e, client)) => {
                        self.state = ImapState::Connected(client);
                        Err(TransportError::AuthenticationFailed(e.to_string()))
                    }
                }
            }
            authenticated @ ImapState::Authenticated { .. } => {
                self.state = authenticated;
                Ok(())
            }
        }
    }

    async fn open_mailbox(
        &mut self,
        folder: &str,
        access: FolderAccess,
    ) -> Result<(), TransportError> {
        let ImapState::Authenticated { session, .. } = &mut self.state else {
            return Err(TransportError::NotAuthenticated);
        };

        info!("Opening folder '{}' ({:?})", folder, access);
        let opened = match access {
            FolderAccess::ReadWrite => session.select(folder).await,
            FolderAccess::ReadOnly => session.examine(folder).await,
        };

        let mailbox = match opened {
            Ok(mailbox) => mailbox,
            Err(ImapError::No(_)) => return Err(TransportError::FolderNotFound(folder.to_string())),
            Err(e) => return self.settle(Err(e)),
        };
        debug!(
            "Folder '{}' opened with {} message(s), UIDVALIDITY={:?}",
            folder, mailbox.exists, mailbox.uid_validity
        );

        if let ImapState::Authenticated { folder: open, .. } = &mut self.state {
            *open = Some(folder.to_string());
        }
        Ok(())
    }

    async fn fetch_summaries(
        &mut self,
        range: UidRange,
    ) -> Result<Vec<MessageSummary>, TransportError> {
        let sequence_set = range.to_sequence_set();
        let session = self.session_mut()?;
        let fetched = collect_fetches(session, &sequence_set, SUMMARY_QUERY).await;
        let fetches = self.settle(fetched)?;

        let summaries = parser::summarize_all(fetches.iter().filter_map(|fetch| {
            let Some(uid) = fetch.uid.map(MessageUid) else {
                warn!("Skipping fetch response without UID");
                return None;
            };
            Some(FetchedSummary {
                uid,
                flags: flags_of(fetch),
                header: fetch.header(),
                structure: fetch.bodystructure(),
            })
        }));

        debug!(
            "Fetched {} message summaries from {} response(s)",
            summaries.len(),
            fetches.len()
        );
        Ok(summaries)
    }

    async fn get_body_part(
        &mut self,
        uid: MessageUid,
        descriptor: &AttachmentDescriptor,
    ) -> Result<Vec<u8>, TransportError> {
        let query = section_query(descriptor);
        let session = self.session_mut()?;
        let fetched = collect_fetches(session, &uid.to_string(), &query).await;
        let fetches = self.settle(fetched)?;

        let fetch = fetches
            .iter()
            .find(|fetch| fetch.uid == Some(uid.0))
            .ok_or(TransportError::MessageNotFound(uid))?;

        let part_not_found = || TransportError::PartNotFound {
            uid,
            part: descriptor.part,
            name: descriptor.name.clone(),
        };
        let raw = fetch
            .section(&SectionPath::Part(descriptor.section.clone(), None))
            .ok_or_else(part_not_found)?;
        let structure = fetch.bodystructure().ok_or_else(part_not_found)?;

        debug!(
            "Fetched section {} of UID={} ({} bytes)",
            descriptor.section_spec(),
            uid,
            raw.len()
        );
        decode_section(structure, &descriptor.section, raw).ok_or_else(|| TransportError::Parse {
            uid,
            reason: format!(
                "body section {} does not decode",
                descriptor.section_spec()
            ),
        })
    }

    async fn add_flags(
        &mut self,
        uid: MessageUid,
        flags: MessageFlags,
        silent: bool,
    ) -> Result<(), TransportError> {
        let item = if silent { "+FLAGS.SILENT" } else { "+FLAGS" };
        let command = format!("{} ({})", item, flags.to_imap_list());

        debug!("Storing {} on UID={}", command, uid);
        let session = self.session_mut()?;
        let stored = store_flags(session, &uid.to_string(), &command).await;
        self.settle(stored)
    }

    async fn expunge(&mut self) -> Result<(), TransportError> {
        let session = self.session_mut()?;
        let expunged = expunge_all(session).await;
        let removed = self.settle(expunged)?;
        info!("Expunged {} message(s)", removed);
        Ok(())
    }

    async fn disconnect(&mut self, quit: bool) -> Result<(), TransportError> {
        match std::mem::replace(&mut self.state, ImapState::Disconnected) {
            ImapState::Authenticated { mut session, .. } if quit => {
                info!("Logging out from IMAP server");
                session.logout().await.map_err(map_imap_error)
            }
            _ => Ok(()),
        }
    }

    fn is_connected(&self) -> bool {
        !matches!(self.state, ImapState::Disconnected)
    }

    fn is_authenticated(&self) -> bool {
        matches!(
            self.state,
            ImapState::Authenticated {
                folder: Some(_),
                ..
            }
        )
    }
}

impl Drop for ImapTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("ImapTransport dropped without explicit disconnect - session will be closed");
        }
    }
}
