// src/server/mod.rs

//! warp filters for the HTTP surface: routing, key checks, request logging and
//! rejection → `{"error": ...}` replies.

use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};
use warp::{Filter, Rejection};

use crate::config::FixedTables;
use crate::error::GatewayError;
use crate::files::{FileStore, FolderRouter};
use crate::gateway::SheetGateway;

pub mod handlers;
pub mod openapi;
pub mod upload;

/// Largest JSON body accepted on the sheet routes.
const JSON_BODY_LIMIT: u64 = 1024 * 1024;

/// Everything the handlers share, built once at start-up.
pub struct AppState {
    pub gateway: SheetGateway,
    pub files: Arc<dyn FileStore>,
    pub folders: FolderRouter,
    pub write_key: SecretString,
    pub tables: FixedTables,
    pub max_upload_bytes: u64,
}

pub type Shared = Arc<AppState>;

pub(crate) fn reject(err: GatewayError) -> Rejection {
    warp::reject::custom(err)
}

fn with_state(state: Shared) -> impl Filter<Extract = (Shared,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&state))
}

/// The key a caller presented: `?key=` first, then the `Authorization`
/// header with or without its `Bearer ` prefix.
pub fn presented_key<'a>(query: Option<&'a str>, authorization: Option<&'a str>) -> Option<&'a str> {
    query
        .filter(|k| !k.is_empty())
        .or_else(|| authorization.map(bearer_token))
        .filter(|k| !k.is_empty())
}

/// Strip the `Bearer ` scheme before trimming; a bare `Bearer` carries no
/// token.
fn bearer_token(header: &str) -> &str {
    match header.trim_start().strip_prefix("Bearer ") {
        Some(token) => token.trim(),
        None if header.trim() == "Bearer" => "",
        None => header.trim(),
    }
}

/// Passes only when the request carries the shared write key.
fn authorized(state: Shared) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::query::<HashMap<String, String>>()
        .and(warp::header::optional::<String>("authorization"))
        .and(with_state(state))
        .and_then(
            |query: HashMap<String, String>, auth: Option<String>, state: Shared| async move {
                let presented = presented_key(query.get("key").map(String::as_str), auth.as_deref());
                match presented {
                    Some(key) if key == state.write_key.expose_secret() => Ok::<_, Rejection>(()),
                    _ => {
                        warn!(presented = presented.is_some(), "write key rejected");
                        Err(reject(GatewayError::Unauthorized))
                    }
                }
            },
        )
        .untuple_one()
}

/// Parse the body as JSON whatever its declared content type.
fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send + 'static,
{
    warp::body::content_length_limit(JSON_BODY_LIMIT)
        .and(warp::body::bytes())
        .and_then(|body: Bytes| async move {
            serde_json::from_slice::<T>(&body)
                .map_err(|e| reject(GatewayError::bad_request(format!("Invalid JSON body: {}", e))))
        })
}

/// Every route, with rejections turned into JSON and each request logged.
pub fn routes(state: Shared) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    use handlers::*;

    let s = || with_state(Arc::clone(&state));
    let key = || authorized(Arc::clone(&state));

    let index = warp::path::end()
        .and(warp::get())
        .and_then(index);

    let writes = warp::path!("sheet" / "write_row")
        .and(warp::post())
        .and(key())
        .and(s())
        .and(json_body::<WriteRowRequest>())
        .and_then(write_row)
        .or(warp::path!("sheet" / "write_passthrough")
            .and(warp::post())
            .and(key())
            .and(s())
            .and(json_body())
            .and_then(write_passthrough))
        .unify()
        .or(warp::path!("sheet" / "write_passthrough_log")
            .and(warp::post())
            .and(key())
            .and(s())
            .and(json_body())
            .and_then(write_passthrough_log))
        .unify()
        .or(warp::path!("log")
            .and(warp::post())
            .and(key())
            .and(s())
            .and(json_body())
            .and_then(log_event))
        .unify()
        .or(warp::path!("integration" / "log")
            .and(warp::post())
            .and(key())
            .and(s())
            .and(json_body())
            .and_then(integration_log))
        .unify()
        .boxed();

    let admin = warp::path!("updateSheetHeaders")
        .and(warp::post())
        .and(key())
        .and(s())
        .and(json_body::<HeadersRequest>())
        .and_then(update_sheet_headers)
        .or(warp::path!("sheet" / "set_headers")
            .and(warp::post())
            .and(key())
            .and(s())
            .and(json_body::<HeadersRequest>())
            .and_then(set_headers))
        .unify()
        .or(warp::path!("sheet" / "update_structure")
            .and(warp::post())
            .and(key())
            .and(s())
            .and(json_body::<StructureRequest>())
            .and_then(update_structure))
        .unify()
        .or(warp::path!("sheet" / "create")
            .and(warp::post())
            .and(key())
            .and(s())
            .and(json_body::<CreateRequest>())
            .and_then(create_sheet))
        .unify()
        .or(warp::path!("sheet" / "delete")
            .and(warp::post())
            .and(key())
            .and(s())
            .and(json_body::<SheetRequest>())
            .and_then(delete_sheet))
        .unify()
        .or(warp::path!("sheet" / "rename")
            .and(warp::post())
            .and(key())
            .and(s())
            .and(json_body::<RenameRequest>())
            .and_then(rename_sheet))
        .unify()
        .boxed();

    let reads = warp::path!("sheet" / "get_headers")
        .and(warp::post())
        .and(s())
        .and(json_body::<SheetRequest>())
        .and_then(get_headers)
        .or(warp::path!("sheet" / "get_all")
            .and(warp::post())
            .and(s())
            .and(json_body::<SheetRequest>())
            .and_then(get_all))
        .unify()
        .or(warp::path!("sheet" / "list_all")
            .and(warp::get())
            .and(s())
            .and_then(list_all))
        .unify()
        .or(warp::path!("inventory" / String)
            .and(warp::get())
            .and(s())
            .and_then(inventory))
        .unify()
        .or(warp::path!("inventory" / "structured" / String)
            .and(warp::get())
            .and(s())
            .and_then(inventory_structured))
        .unify()
        .or(warp::path!("inventory" / "raw" / String)
            .and(warp::get())
            .and(warp::query::<RawQuery>())
            .and(s())
            .and_then(inventory_raw))
        .unify()
        .or(warp::path!("inventory" / "item" / String / String)
            .and(warp::get())
            .and(warp::query::<ItemQuery>())
            .and(s())
            .and_then(inventory_item))
        .unify()
        .boxed();

    let files = warp::path!("upload" / "file")
        .and(warp::post())
        .and(key())
        .and(s())
        .and(warp::multipart::form().max_length(state.max_upload_bytes))
        .and_then(upload::upload_file)
        .or(warp::path!("health" / "drive")
            .and(warp::get())
            .and(warp::query::<upload::DriveHealthQuery>())
            .and(s())
            .and_then(upload::drive_health))
        .unify()
        .boxed();

    let docs = warp::path!("openapi.yaml")
        .and(warp::get())
        .and_then(openapi_yaml);

    index
        .or(writes)
        .unify()
        .or(admin)
        .unify()
        .or(reads)
        .unify()
        .or(files)
        .unify()
        .or(docs)
        .unify()
        .recover(handle_rejection)
        .with(warp::log::custom(log_request))
}

async fn openapi_yaml() -> Result<Response, Rejection> {
    match openapi::render() {
        Ok(yaml) => Ok(reply::with_header(yaml, "content-type", "text/yaml").into_response()),
        Err(e) => {
            error!(error = %e, "failed to render openapi document");
            Ok(error_reply(StatusCode::INTERNAL_SERVER_ERROR, "openapi document unavailable"))
        }
    }
}

fn error_reply(status: StatusCode, message: &str) -> Response {
    reply::with_status(reply::json(&json!({ "error": message })), status).into_response()
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(e) = err.find::<GatewayError>() {
        let status = e.status();
        if status.is_server_error() {
            error!(error = %e, "request failed");
        } else {
            debug!(error = %e, status = status.as_u16(), "request rejected");
        }
        return Ok(error_reply(status, &e.to_string()));
    }

    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large")
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length required")
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported media type")
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query string")
    } else if err.find::<warp::reject::InvalidHeader>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid header")
    } else {
        error!(rejection = ?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };
    Ok(error_reply(status, message))
}

/// Method, path, status and latency. Headers and query strings are never
/// logged; they can carry the write key.
fn log_request(info: warp::log::Info<'_>) {
    info!(
        method = %info.method(),
        path = info.path(),
        status = info.status().as_u16(),
        elapsed_ms = info.elapsed().as_millis() as u64,
        "request"
    );
}
