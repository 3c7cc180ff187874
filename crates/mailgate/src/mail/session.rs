//! Reconnecting mailbox session.
//!
//! A [`MailboxSession`] owns one transport for the lifetime of a run. It is
//! the only code that changes transport connectivity, and it threads the run's
//! [`CancelSignal`] through every remote call: once cancellation is requested
//! no new call starts and an in-flight call is dropped with
//! [`TransportError::Cancelled`].

use std::future::Future;

use secrecy::SecretString;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelSignal;
use crate::sanitize::mask_address;

use super::model::{AttachmentDescriptor, MessageFlags, MessageSummary, MessageUid, UidRange};
use super::transport::{FolderAccess, MailTransport, SecurityMode, TransportError};

/// Where and as whom the session connects.
#[derive(Debug)]
pub struct MailboxSettings {
    pub host: String,
    pub port: u16,
    pub security: SecurityMode,
    pub username: String,
    pub password: SecretString,
    pub folder: String,
}

/// The connection plus open folder used for fetch, flag and expunge.
pub struct MailboxSession<T> {
    transport: T,
    settings: MailboxSettings,
    cancel: CancelSignal,
}

async fn guarded<R>(
    cancel: &CancelSignal,
    call: impl Future<Output = Result<R, TransportError>>,
) -> Result<R, TransportError> {
    cancel
        .guard(call)
        .await
        .unwrap_or(Err(TransportError::Cancelled))
}

impl<T: MailTransport> MailboxSession<T> {
    pub fn new(transport: T, settings: MailboxSettings, cancel: CancelSignal) -> Self {
        Self {
            transport,
            settings,
            cancel,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Authenticated with the folder open. Implies [`is_connected`](Self::is_connected).
    pub fn is_authenticated(&self) -> bool {
        self.transport.is_connected() && self.transport.is_authenticated()
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Brings the session to Authenticated-Open, performing only the missing steps.
    ///
    /// Connectivity and authentication are checked independently, so calling
    /// this on a healthy session issues no remote calls.
    #[instrument(skip(self), fields(host = %self.settings.host, port = self.settings.port))]
    pub async fn reconnect(&mut self) -> Result<(), TransportError> {
        info!(
            connected = self.transport.is_connected(),
            authenticated = self.transport.is_authenticated(),
            "Reconnecting mailbox session"
        );

        if !self.transport.is_connected() {
            guarded(
                &self.cancel,
                self.transport.connect(
                    &self.settings.host,
                    self.settings.port,
                    self.settings.security,
                ),
            )
            .await?;
        }

        if !self.transport.is_authenticated() {
            debug!(user = %mask_address(&self.settings.username), "Authenticating");
            guarded(
                &self.cancel,
                self.transport
                    .authenticate(&self.settings.username, &self.settings.password),
            )
            .await?;
            guarded(
                &self.cancel,
                self.transport
                    .open_mailbox(&self.settings.folder, FolderAccess::ReadWrite),
            )
            .await?;
        }

        Ok(())
    }

    pub async fn fetch_summaries(
        &mut self,
        range: UidRange,
    ) -> Result<Vec<MessageSummary>, TransportError> {
        guarded(&self.cancel, self.transport.fetch_summaries(range)).await
    }

    pub async fn get_body_part(
        &mut self,
        uid: MessageUid,
        descriptor: &AttachmentDescriptor,
    ) -> Result<Vec<u8>, TransportError> {
        guarded(&self.cancel, self.transport.get_body_part(uid, descriptor)).await
    }

    pub async fn add_flags(
        &mut self,
        uid: MessageUid,
        flags: MessageFlags,
        silent: bool,
    ) -> Result<(), TransportError> {
        guarded(&self.cancel, self.transport.add_flags(uid, flags, silent)).await
    }

    pub async fn expunge(&mut self) -> Result<(), TransportError> {
        guarded(&self.cancel, self.transport.expunge()).await
    }

    /// Reconnects and expunges without fetching anything.
    pub async fn expunge_only(&mut self) -> Result<(), TransportError> {
        self.reconnect().await?;
        self.expunge().await?;
        info!(folder = %self.settings.folder, "Expunged messages flagged Deleted");
        Ok(())
    }

    /// Best-effort disconnect. Runs even after cancellation was requested.
    pub async fn disconnect(&mut self) {
        if !self.transport.is_connected() {
            return;
        }
        if let Err(e) = self.transport.disconnect(true).await {
            warn!(error = %e, "Failed to disconnect mailbox session cleanly");
        }
    }
}
