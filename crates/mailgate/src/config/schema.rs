use serde::{Deserialize, Serialize};

use crate::mail::SecurityMode;
use crate::retry::{Backoff, RetryPolicy};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub mail: MailConfig,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailConfig {
    pub host: String,
    #[serde(default = "default_mail_port")]
    pub port: u16,
    #[serde(default)]
    pub security: SecurityMode,
    pub username: String,
    /// Direct password value. Prefer `passwordFile` or `passwordEnvVar`.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_file: Option<String>,
    #[serde(default)]
    pub password_env_var: Option<String>,
    #[serde(default = "default_folder")]
    pub folder: String,
}

fn default_mail_port() -> u16 {
    993
}

fn default_folder() -> String {
    "INBOX".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Base directory (or `file://` URI) holding the containers.
    pub connection_string: String,
    pub container_name: String,
    /// Fixed content type for stored attachments; guessed from the file name when unset.
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueConfig {
    /// Spool directory.
    pub connection_string: String,
    pub topic_name: String,
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

fn default_send_timeout_ms() -> u64 {
    30_000
}

/// One layer's retry budget. `count` is the number of retries after the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySettings {
    pub count: u32,
    #[serde(default)]
    pub initial_backoff_ms: u64,
    #[serde(default)]
    pub max_backoff_ms: u64,
}

impl RetrySettings {
    pub const fn with_count(count: u32) -> Self {
        Self {
            count,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::with_retries(self.count)
            .backoff(Backoff::from_millis(self.initial_backoff_ms, self.max_backoff_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_reconnect_retry")]
    pub reconnect: RetrySettings,
    #[serde(default = "default_storage_retry")]
    pub storage: RetrySettings,
    #[serde(default = "default_queue_retry")]
    pub queue: RetrySettings,
    #[serde(default = "default_invocation_retry")]
    pub invocation: RetrySettings,
}

fn default_reconnect_retry() -> RetrySettings {
    RetrySettings::with_count(5)
}

fn default_storage_retry() -> RetrySettings {
    RetrySettings::with_count(5)
}

fn default_queue_retry() -> RetrySettings {
    RetrySettings::with_count(5)
}

fn default_invocation_retry() -> RetrySettings {
    RetrySettings::with_count(2)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            reconnect: default_reconnect_retry(),
            storage: default_storage_retry(),
            queue: default_queue_retry(),
            invocation: default_invocation_retry(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
