use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::backend::{StorageBackend, StorageError};

/// Storage backend keeping each container as a directory on the local filesystem.
pub struct FileSystemBackend {
    container_directory: PathBuf,
}

impl FileSystemBackend {
    /// `connection_string` is a base directory, optionally written as a
    /// `file://` URI. Objects land in `<base>/<container>/`.
    pub fn new(connection_string: &str, container: &str) -> Self {
        let base = connection_string
            .strip_prefix("file://")
            .unwrap_or(connection_string);
        Self {
            container_directory: Path::new(base).join(container),
        }
    }

    pub fn container_directory(&self) -> &Path {
        &self.container_directory
    }

    fn object_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        let invalid = |reason: &str| StorageError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if path.is_empty() {
            return Err(invalid("empty object name"));
        }
        if path == "." || path == ".." {
            return Err(invalid("relative path component"));
        }
        if path.contains(['/', '\\']) {
            return Err(invalid("object names may not contain path separators"));
        }
        if path.contains('\0') {
            return Err(invalid("object names may not contain NUL"));
        }

        Ok(self.container_directory.join(path))
    }

    fn locator(path: &Path) -> String {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        format!("file://{}", absolute.display())
    }

    async fn ensure_directory(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.container_directory)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: self.container_directory.clone(),
                source: e,
            })
    }
}

#[async_trait]
impl StorageBackend for FileSystemBackend {
    async fn store(
        &self,
        bytes: &[u8],
        path: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let target = self.object_path(path)?;
        self.ensure_directory().await?;

        // Write next to the target and rename so readers never see a partial object.
        // The temp name must stay short: `path` may already be NAME_MAX bytes.
        let temp = self
            .container_directory
            .join(format!(".{}.tmp", Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&temp, bytes).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::WriteFile {
                path: temp,
                source: e,
            });
        }
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::WriteFile {
                path: target,
                source: e,
            });
        }

        debug!(
            object = path,
            content_type,
            bytes = bytes.len(),
            "Stored object"
        );
        Ok(Self::locator(&target))
    }

    async fn fetch(&self, path: &str, _content_type: &str) -> Result<Vec<u8>, StorageError> {
        let target = self.object_path(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(StorageError::ReadFile {
                path: target,
                source: e,
            }),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let target = self.object_path(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFile {
                path: target,
                source: e,
            }),
        }
    }
}
