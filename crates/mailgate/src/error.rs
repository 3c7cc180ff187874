use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailgateError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mail transport error: {0}")]
    Transport(#[from] crate::mail::TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] crate::notify::QueueError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No config file given and no default location available")]
    NoConfigFile,

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to resolve secret: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

pub type Result<T> = std::result::Result<T, MailgateError>;
