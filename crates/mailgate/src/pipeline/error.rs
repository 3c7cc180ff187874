use thiserror::Error;

use crate::mail::TransportError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Mailbox operation failed: {0}")]
    Transport(TransportError),
}

impl From<TransportError> for PipelineError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Transport(other),
        }
    }
}
