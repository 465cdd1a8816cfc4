// src/files/drive.rs

//! `FileStore` backed by the Google Drive v3 REST API.

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{FileEntry, FileStore, FileStoreError, StoredFile};

pub const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
pub const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedFile {
    id: String,
    #[serde(default)]
    web_view_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileEntryBody>,
}

#[derive(Debug, Deserialize)]
struct FileEntryBody {
    id: String,
    #[serde(default)]
    name: String,
}

pub struct DriveStore {
    client: Client,
    token: SecretString,
}

impl DriveStore {
    pub fn new(client: Client, token: SecretString) -> Self {
        Self { client, token }
    }
}

#[async_trait]
impl FileStore for DriveStore {
    async fn create_file(
        &self,
        name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        parent_folder_id: &str,
    ) -> Result<StoredFile, FileStoreError> {
        let boundary = format!("sheetbridge-{}", uuid::Uuid::new_v4().simple());
        let metadata = json!({ "name": name, "parents": [parent_folder_id] });
        let size = bytes.len();
        let body = related_body(&boundary, &metadata, mime_type, &bytes);

        debug!(name, folder = parent_folder_id, size, "drive upload");
        let resp = self
            .client
            .post(DRIVE_UPLOAD_URL)
            .bearer_auth(self.token.expose_secret())
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id,webViewLink"),
                ("supportsAllDrives", "true"),
            ])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;
        let created: CreatedFile = decode(check(resp).await?).await?;
        info!(name, id = %created.id, folder = parent_folder_id, size, "uploaded file");

        Ok(StoredFile {
            id: created.id,
            web_url: created.web_view_link.unwrap_or_default(),
        })
    }

    async fn list_folder(
        &self,
        folder_id: &str,
        page_size: u32,
    ) -> Result<Vec<FileEntry>, FileStoreError> {
        let query = format!("'{}' in parents", folder_id.replace('\'', "\\'"));
        let page_size = page_size.to_string();
        let resp = self
            .client
            .get(DRIVE_FILES_URL)
            .bearer_auth(self.token.expose_secret())
            .query(&[
                ("q", query.as_str()),
                ("pageSize", page_size.as_str()),
                ("fields", "files(id, name)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await?;
        let list: FileList = decode(check(resp).await?).await?;
        Ok(list
            .files
            .into_iter()
            .map(|f| FileEntry {
                id: f.id,
                name: f.name,
            })
            .collect())
    }
}

/// A `multipart/related` body: JSON metadata part followed by the media part.
pub fn related_body(boundary: &str, metadata: &Value, mime_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n--{b}\r\nContent-Type: {t}\r\n\r\n",
            b = boundary,
            m = metadata,
            t = mime_type,
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

async fn check(resp: Response) -> Result<Response, FileStoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(FileStoreError::Api {
        status: status.as_u16(),
        message: crate::store::sheets::api_message(&body),
    })
}

async fn decode<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, FileStoreError> {
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| FileStoreError::Decode(e.to_string()))
}
