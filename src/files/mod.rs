//! The file-storage collaborator and the filename → folder routing table.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub mod drive;
pub mod memory;
pub mod routing;

pub use drive::DriveStore;
pub use memory::MemoryFileStore;
pub use routing::{FolderRouter, DEFAULT_FOLDER_ID};

/// What the file store hands back after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub id: String,
    pub web_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("file store returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("file store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected file store response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn create_file(
        &self,
        name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        parent_folder_id: &str,
    ) -> Result<StoredFile, FileStoreError>;

    /// Up to `page_size` files whose parent is `folder_id`.
    async fn list_folder(
        &self,
        folder_id: &str,
        page_size: u32,
    ) -> Result<Vec<FileEntry>, FileStoreError>;
}
