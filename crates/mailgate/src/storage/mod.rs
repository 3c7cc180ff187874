pub mod attachment_store;
pub mod backend;
pub mod filesystem;

pub use attachment_store::AttachmentStore;
pub use backend::{StorageBackend, StorageError};
pub use filesystem::FileSystemBackend;
