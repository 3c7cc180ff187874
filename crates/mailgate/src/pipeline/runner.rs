use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cancel::CancelSignal;
use crate::config::Config;
use crate::error::MailgateError;
use crate::mail::{
    classify_transport_fault, ImapTransport, MailTransport, MailboxSession, MailboxSettings,
    TransportError, UidRange,
};
use crate::notify::{NotificationPublisher, SpoolQueue};
use crate::retry::Fault;
use crate::storage::{AttachmentStore, FileSystemBackend};

use super::config::{mailbox_settings, PipelineConfig};
use super::error::PipelineError;
use super::handler::{MessageHandler, MessageOutcome};
use super::report::{FailureNotice, RunReport};

const RUN_CODE: &str = "MailIngestionPipeline::run";

/// One run over the mailbox: reconnect, fetch every summary, handle each
/// message in order, expunge.
///
/// The pipeline is the run-scoped context: it owns the session and lends the
/// store and publisher to the message handler.
pub struct MailIngestionPipeline<T> {
    session: MailboxSession<T>,
    store: AttachmentStore,
    publisher: NotificationPublisher,
    config: PipelineConfig,
}

impl MailIngestionPipeline<ImapTransport> {
    /// Production constructor: IMAP mailbox, filesystem storage, spool queue.
    pub fn from_config(config: &Config, cancel: CancelSignal) -> Result<Self, MailgateError> {
        let pipeline_config = PipelineConfig::from_config(config);

        let backend = FileSystemBackend::new(
            &config.storage.connection_string,
            &config.storage.container_name,
        );
        let store = AttachmentStore::new(Arc::new(backend), pipeline_config.storage_policy)
            .with_content_type(config.storage.content_type.clone());

        let spool_directory = config
            .queue
            .connection_string
            .strip_prefix("file://")
            .unwrap_or(&config.queue.connection_string);
        let queue = SpoolQueue::new(
            spool_directory,
            &config.queue.topic_name,
            Duration::from_millis(config.queue.send_timeout_ms),
        );
        let publisher = NotificationPublisher::new(Arc::new(queue), pipeline_config.queue_policy);

        Ok(Self::new(
            ImapTransport::new(),
            mailbox_settings(config)?,
            cancel,
            store,
            publisher,
            pipeline_config,
        ))
    }
}

impl<T: MailTransport> MailIngestionPipeline<T> {
    pub fn new(
        transport: T,
        settings: MailboxSettings,
        cancel: CancelSignal,
        store: AttachmentStore,
        publisher: NotificationPublisher,
        config: PipelineConfig,
    ) -> Self {
        Self {
            session: MailboxSession::new(transport, settings, cancel),
            store,
            publisher,
            config,
        }
    }

    pub fn session(&self) -> &MailboxSession<T> {
        &self.session
    }

    pub fn into_session(self) -> MailboxSession<T> {
        self.session
    }

    /// Requests cancellation of the current run.
    pub fn stop(&self) {
        self.session.cancel_signal().cancel();
    }

    /// Runs once and reports the outcome. Never fails: errors end up in the
    /// report, and cancellation is flagged on it.
    pub async fn run(&mut self) -> RunReport {
        let span = info_span!("mail_ingestion_run", run_id = %Uuid::new_v4());
        async {
            match self.run_steps().await {
                Ok(processed) => {
                    info!(processed, "Mail ingestion run completed");
                    RunReport::succeeded(processed)
                }
                Err(PipelineError::Cancelled) => {
                    error!("Operation cancelled, disconnecting client");
                    self.session.disconnect().await;
                    RunReport::cancelled(FailureNotice::new(
                        RUN_CODE,
                        "Operation cancelled. Disconnecting client...",
                        PipelineError::Cancelled.to_string(),
                    ))
                }
                Err(e) => {
                    error!(error = %e, "Unexpected error while running mail ingestion");
                    self.session.disconnect().await;
                    RunReport::failed(FailureNotice::new(
                        RUN_CODE,
                        "Unexpected error occurred while running mail ingestion. Disconnecting client...",
                        e.to_string(),
                    ))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Reconnects and expunges without fetching.
    pub async fn expunge_only(&mut self) -> Result<(), PipelineError> {
        let result = self.session.expunge_only().await;
        self.session.disconnect().await;
        result.map_err(PipelineError::from)
    }

    async fn run_steps(&mut self) -> Result<usize, PipelineError> {
        self.session.reconnect().await?;
        let processed = self.step_process_inbox().await?;
        self.session.expunge().await?;
        self.session.disconnect().await;
        Ok(processed)
    }

    /// The fetch loop. Transient mailbox faults reconnect and retry, other
    /// faults abandon the attempt; an exhausted budget yields zero.
    async fn step_process_inbox(&mut self) -> Result<usize, PipelineError> {
        let policy = self.config.reconnect_policy;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match self.fetch_and_process().await {
                Ok(processed) => return Ok(processed),
                Err(TransportError::Cancelled) => return Err(PipelineError::Cancelled),
                Err(e) => e,
            };

            match classify_transport_fault(&error) {
                Fault::Transient => {
                    warn!(attempt, error = %error, "Transient mailbox fault, reconnecting");
                    self.session.reconnect().await?;
                }
                Fault::Fatal => {
                    error!(attempt, error = %error, "Unhandled error while processing inbox");
                }
            }

            if attempt >= policy.max_attempts() {
                break;
            }
            let cancel = self.session.cancel_signal();
            if cancel.guard(policy.pause(attempt)).await.is_none() {
                return Err(PipelineError::Cancelled);
            }
        }

        error!(
            attempts = attempt,
            "Retry budget for inbox processing exhausted"
        );
        Ok(0)
    }

    async fn fetch_and_process(&mut self) -> Result<usize, TransportError> {
        let summaries = self.session.fetch_summaries(UidRange::all()).await?;
        info!(count = summaries.len(), "Messages fetched");

        let handler = MessageHandler::new(&self.store, &self.publisher);
        let mut incomplete = 0;
        for summary in &summaries {
            if let MessageOutcome::Incomplete { .. } =
                handler.process(&mut self.session, summary).await?
            {
                incomplete += 1;
            }
        }

        if incomplete > 0 {
            warn!(incomplete, "Some messages were left on the server");
        }
        Ok(summaries.len())
    }
}
