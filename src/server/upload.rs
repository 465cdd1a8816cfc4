// src/server/upload.rs

use bytes::BufMut;
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tracing::{error, info, instrument};
use warp::http::StatusCode;
use warp::multipart::{FormData, Part};
use warp::reply::{self, Reply, Response};
use warp::Rejection;

use super::{reject, Shared};
use crate::error::GatewayError;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
const HEALTH_PAGE_SIZE: u32 = 5;

/// One multipart field, fully buffered.
#[derive(Debug)]
struct FormField {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct DriveHealthQuery {
    pub folder_id: Option<String>,
}

/// Drain every part in arrival order; a part must be read before the next
/// one is polled.
async fn read_form(form: FormData) -> Result<Vec<FormField>, warp::Error> {
    form.and_then(|mut part: Part| async move {
        let mut bytes = Vec::new();
        while let Some(chunk) = part.data().await {
            bytes.put(chunk?);
        }
        Ok(FormField {
            name: part.name().to_string(),
            filename: part.filename().map(str::to_string),
            content_type: part.content_type().map(str::to_string),
            bytes,
        })
    })
    .try_collect()
    .await
}

#[instrument(skip_all)]
pub async fn upload_file(state: Shared, form: FormData) -> Result<Response, Rejection> {
    let started = Instant::now();
    let fields = read_form(form)
        .await
        .map_err(|e| reject(GatewayError::bad_request(format!("Invalid multipart body: {}", e))))?;

    let mut file = None;
    let mut folder_override = None;
    for field in fields {
        match field.name.as_str() {
            "file" if file.is_none() => {
                if field.filename.as_deref().is_some_and(|f| !f.is_empty()) {
                    file = Some(field);
                }
            }
            "folder_id" => {
                let id = String::from_utf8_lossy(&field.bytes).trim().to_string();
                if !id.is_empty() {
                    folder_override = Some(id);
                }
            }
            _ => {}
        }
    }

    let Some(file) = file else {
        return Err(reject(GatewayError::bad_request("No file provided")));
    };
    let filename = file.filename.unwrap_or_default();
    let folder = folder_override.unwrap_or_else(|| state.folders.detect(&filename).to_string());
    let mime_type = file
        .content_type
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
    let size = file.bytes.len();

    let stored = state
        .files
        .create_file(&filename, file.bytes, &mime_type, &folder)
        .await
        .map_err(|e| reject(e.into()))?;

    info!(
        file = %filename,
        folder = %folder,
        bytes = size,
        id = %stored.id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "uploaded"
    );
    Ok(reply::json(&json!({
        "status": "success",
        "file_id": stored.id,
        "url": stored.web_url,
        "folder_used": folder,
    }))
    .into_response())
}

/// Lists a few files in a folder to prove the file store is reachable.
pub async fn drive_health(query: DriveHealthQuery, state: Shared) -> Result<Response, Rejection> {
    let folder = query
        .folder_id
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| state.folders.default_folder().to_string());

    match state.files.list_folder(&folder, HEALTH_PAGE_SIZE).await {
        Ok(files) => Ok(reply::json(&json!({
            "status": "ok",
            "folder_checked": folder,
            "files_found": files,
        }))
        .into_response()),
        Err(e) => {
            error!(folder = %folder, error = %e, "drive health check failed");
            Ok(reply::with_status(
                reply::json(&json!({ "status": "error", "message": e.to_string() })),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
            .into_response())
        }
    }
}
