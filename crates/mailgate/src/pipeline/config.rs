use crate::config::{resolve_mail_password, Config};
use crate::error::ConfigError;
use crate::mail::MailboxSettings;
use crate::retry::RetryPolicy;

/// Retry budgets for each layer of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Bounds the fetch loop; transient mailbox faults reconnect and retry.
    pub reconnect_policy: RetryPolicy,
    pub storage_policy: RetryPolicy,
    /// Bounds notification retries after a timeout.
    pub queue_policy: RetryPolicy,
    /// Bounds whole invocations.
    pub invocation_policy: RetryPolicy,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reconnect_policy: config.retry.reconnect.policy(),
            storage_policy: config.retry.storage.policy(),
            queue_policy: config.retry.queue.policy(),
            invocation_policy: config.retry.invocation.policy(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reconnect_policy: RetryPolicy::with_retries(5),
            storage_policy: RetryPolicy::with_retries(5),
            queue_policy: RetryPolicy::with_retries(5),
            invocation_policy: RetryPolicy::with_retries(2),
        }
    }
}

/// Mailbox connection settings with the password resolved.
pub fn mailbox_settings(config: &Config) -> Result<MailboxSettings, ConfigError> {
    Ok(MailboxSettings {
        host: config.mail.host.clone(),
        port: config.mail.port,
        security: config.mail.security,
        username: config.mail.username.clone(),
        password: resolve_mail_password(&config.mail)?,
        folder: config.mail.folder.clone(),
    })
}
