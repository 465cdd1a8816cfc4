use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

use super::{FileEntry, FileStore, FileStoreError, StoredFile};

/// A file held by `MemoryFileStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub folder_id: String,
    pub bytes: Vec<u8>,
}

/// Keeps uploads in memory; backs `--in-memory` runs and the route tests.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: Mutex<Vec<UploadedFile>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploads(&self) -> Vec<UploadedFile> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn create_file(
        &self,
        name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        parent_folder_id: &str,
    ) -> Result<StoredFile, FileStoreError> {
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        let id = format!("mem-{}", files.len() + 1);
        files.push(UploadedFile {
            id: id.clone(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            folder_id: parent_folder_id.to_string(),
            bytes,
        });
        Ok(StoredFile {
            web_url: format!("memory://files/{}", id),
            id,
        })
    }

    async fn list_folder(
        &self,
        folder_id: &str,
        page_size: u32,
    ) -> Result<Vec<FileEntry>, FileStoreError> {
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(files
            .iter()
            .filter(|f| f.folder_id == folder_id)
            .take(page_size as usize)
            .map(|f| FileEntry {
                id: f.id.clone(),
                name: f.name.clone(),
            })
            .collect())
    }
}
