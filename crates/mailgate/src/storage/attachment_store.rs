use std::sync::Arc;

use tracing::{error, info, warn};

use crate::contract::AttachmentSummary;
use crate::retry::{Fault, RetryError, RetryPolicy};

use super::backend::{StorageBackend, StorageError};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Persists attachment bytes under their canonical storage name.
///
/// Failures never cross this boundary as errors: callers get a locator or
/// nothing, and nothing is a definitive failure.
pub struct AttachmentStore {
    backend: Arc<dyn StorageBackend>,
    policy: RetryPolicy,
    content_type: Option<String>,
}

impl AttachmentStore {
    pub fn new(backend: Arc<dyn StorageBackend>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            policy,
            content_type: None,
        }
    }

    /// Stores every object with `content_type` instead of guessing it from the file name.
    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn content_type_for(&self, file_name: &str) -> String {
        match &self.content_type {
            Some(content_type) => content_type.clone(),
            None => mime_guess::from_path(file_name)
                .first()
                .map(|m| m.to_string())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        }
    }

    async fn store_once(
        &self,
        bytes: &[u8],
        summary: &AttachmentSummary<'_>,
    ) -> Result<String, StorageError> {
        let name = summary.storage_file_name();
        self.backend
            .store(bytes, name, &self.content_type_for(name))
            .await
    }

    /// Single write attempt.
    pub async fn persist(&self, bytes: &[u8], summary: &AttachmentSummary<'_>) -> Option<String> {
        match self.store_once(bytes, summary).await {
            Ok(locator) if !locator.is_empty() => {
                info!(
                    attachment_id = %summary.id,
                    file_name = %summary.file_name,
                    "Attachment saved to storage"
                );
                Some(locator)
            }
            Ok(_) => {
                error!(
                    attachment_id = %summary.id,
                    file_name = %summary.file_name,
                    "Storage returned an empty locator"
                );
                None
            }
            Err(e) => {
                error!(
                    attachment_id = %summary.id,
                    file_name = %summary.file_name,
                    error = %e,
                    "Failed to save attachment to storage"
                );
                None
            }
        }
    }

    /// Retries [`persist`](Self::persist) on every error until the policy's
    /// attempt budget is spent.
    pub async fn persist_with_retry(
        &self,
        bytes: &[u8],
        summary: &AttachmentSummary<'_>,
    ) -> Option<String> {
        let max_attempts = self.policy.max_attempts();
        let result = self
            .policy
            .run(
                |attempt| async move {
                    let stored = self.store_once(bytes, summary).await;
                    if let Err(e) = &stored {
                        warn!(
                            attachment_id = %summary.id,
                            file_name = %summary.file_name,
                            attempt,
                            max_attempts,
                            error = %e,
                            "Failed to save attachment, retrying"
                        );
                    }
                    stored
                },
                |_: &StorageError| Fault::Transient,
            )
            .await;

        match result {
            Ok(locator) if !locator.is_empty() => {
                info!(
                    attachment_id = %summary.id,
                    file_name = %summary.file_name,
                    "Attachment saved to storage"
                );
                Some(locator)
            }
            Ok(_) => {
                error!(
                    attachment_id = %summary.id,
                    file_name = %summary.file_name,
                    "Storage returned an empty locator"
                );
                None
            }
            Err(RetryError::Exhausted { attempts, error } | RetryError::Fatal { attempts, error }) => {
                error!(
                    attachment_id = %summary.id,
                    file_name = %summary.file_name,
                    attempts,
                    error = %error,
                    "Retries expired for attachment"
                );
                None
            }
        }
    }

    pub async fn fetch(&self, summary: &AttachmentSummary<'_>) -> Result<Vec<u8>, StorageError> {
        let name = summary.storage_file_name();
        self.backend.fetch(name, &self.content_type_for(name)).await
    }

    pub async fn delete(&self, summary: &AttachmentSummary<'_>) -> Result<(), StorageError> {
        self.backend.delete(summary.storage_file_name()).await
    }
}
