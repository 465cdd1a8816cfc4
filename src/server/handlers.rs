//! Sheet routes. Each handler turns a request body into one gateway call and
//! the gateway's answer into the JSON shape callers already depend on.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::borrow::Cow;
use tracing::debug;
use warp::reply::{self, Reply, Response};
use warp::Rejection;

use super::{reject, Shared};
use crate::error::GatewayError;

#[derive(Debug, Deserialize)]
pub struct SheetRequest {
    #[serde(default)]
    pub sheet_name: String,
}

#[derive(Debug, Deserialize)]
pub struct WriteRowRequest {
    #[serde(default)]
    pub sheet_name: String,
    #[serde(default)]
    pub item: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct HeadersRequest {
    #[serde(default)]
    pub sheet_name: String,
    pub headers: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct StructureRequest {
    #[serde(default)]
    pub sheet_name: String,
    #[serde(default)]
    pub remove_columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    #[serde(default)]
    pub sheet_name: String,
    #[serde(default)]
    pub headers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    #[serde(default)]
    pub old_name: String,
    #[serde(default)]
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RawQuery {
    pub range: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    pub key_column: Option<String>,
}

fn ok(body: Value) -> Result<Response, Rejection> {
    Ok(reply::json(&body).into_response())
}

/// Path segments arrive percent-encoded; table names often contain spaces.
fn decode_segment(raw: &str) -> Result<String, Rejection> {
    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .map_err(|_| reject(GatewayError::bad_request("Invalid path segment")))
}

/// Drops `sheet_name` while keeping the caller's field order.
fn without_sheet_name(body: Map<String, Value>) -> Map<String, Value> {
    body.into_iter().filter(|(k, _)| k != "sheet_name").collect()
}

pub async fn index() -> Result<Response, Rejection> {
    ok(json!({ "status": "Worker API online" }))
}

pub async fn write_row(state: Shared, body: WriteRowRequest) -> Result<Response, Rejection> {
    let row = state
        .gateway
        .append_record(&body.sheet_name, &body.item)
        .await
        .map_err(reject)?;
    ok(json!({ "message": "Row written", "row": row }))
}

/// The body is the record itself, less its `sheet_name`.
pub async fn write_passthrough(state: Shared, body: Map<String, Value>) -> Result<Response, Rejection> {
    let table = match body.get("sheet_name") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => return Err(reject(GatewayError::bad_request("Missing sheet_name"))),
    };
    let record = without_sheet_name(body);
    let row = state
        .gateway
        .append_record(&table, &record)
        .await
        .map_err(reject)?;
    ok(json!({ "message": "Row written", "row": row }))
}

pub async fn write_passthrough_log(
    state: Shared,
    body: Map<String, Value>,
) -> Result<Response, Rejection> {
    state
        .gateway
        .append_record(&state.tables.sandbox, &body)
        .await
        .map_err(reject)?;
    ok(json!({ "message": "Logged payload successfully", "data": body }))
}

/// Accepts `{"item": {...}}` or the fields themselves.
pub async fn log_event(state: Shared, body: Map<String, Value>) -> Result<Response, Rejection> {
    let record = match body.get("item") {
        Some(Value::Object(item)) => item.clone(),
        _ => without_sheet_name(body),
    };
    let row = state
        .gateway
        .append_record(&state.tables.log, &record)
        .await
        .map_err(reject)?;
    ok(json!({ "message": "Row written", "row": row }))
}

pub async fn integration_log(
    state: Shared,
    body: Map<String, Value>,
) -> Result<Response, Rejection> {
    state
        .gateway
        .append_record(&state.tables.integration_log, &body)
        .await
        .map_err(reject)?;
    ok(json!({ "message": "Integration log added successfully" }))
}

fn require_headers(headers: Option<Vec<String>>) -> Result<Vec<String>, Rejection> {
    headers.ok_or_else(|| reject(GatewayError::bad_request("Missing headers")))
}

pub async fn update_sheet_headers(
    state: Shared,
    body: HeadersRequest,
) -> Result<Response, Rejection> {
    let headers = require_headers(body.headers)?;
    state
        .gateway
        .overwrite_header_row(&body.sheet_name, &headers)
        .await
        .map_err(reject)?;
    ok(json!({ "status": "headers updated" }))
}

pub async fn set_headers(state: Shared, body: HeadersRequest) -> Result<Response, Rejection> {
    let headers = require_headers(body.headers)?;
    state
        .gateway
        .replace_all_and_set_header(&body.sheet_name, &headers)
        .await
        .map_err(reject)?;
    ok(json!({ "message": "Headers updated successfully" }))
}

pub async fn update_structure(state: Shared, body: StructureRequest) -> Result<Response, Rejection> {
    state
        .gateway
        .restructure(&body.sheet_name, &body.remove_columns)
        .await
        .map_err(reject)?;
    ok(json!({ "message": "Structure updated" }))
}

pub async fn create_sheet(state: Shared, body: CreateRequest) -> Result<Response, Rejection> {
    state
        .gateway
        .create_table(&body.sheet_name, &body.headers)
        .await
        .map_err(reject)?;
    ok(json!({ "message": format!("Sheet '{}' created", body.sheet_name) }))
}

pub async fn delete_sheet(state: Shared, body: SheetRequest) -> Result<Response, Rejection> {
    state
        .gateway
        .delete_table(&body.sheet_name)
        .await
        .map_err(reject)?;
    ok(json!({ "message": format!("Sheet '{}' deleted", body.sheet_name) }))
}

pub async fn rename_sheet(state: Shared, body: RenameRequest) -> Result<Response, Rejection> {
    state
        .gateway
        .rename_table(&body.old_name, &body.new_name)
        .await
        .map_err(reject)?;
    ok(json!({
        "message": format!("Renamed {} to {}", body.old_name, body.new_name)
    }))
}

pub async fn get_headers(state: Shared, body: SheetRequest) -> Result<Response, Rejection> {
    let headers = state
        .gateway
        .get_headers(&body.sheet_name)
        .await
        .map_err(reject)?;
    ok(json!({ "headers": headers }))
}

pub async fn get_all(state: Shared, body: SheetRequest) -> Result<Response, Rejection> {
    let data = state
        .gateway
        .get_all(&body.sheet_name)
        .await
        .map_err(reject)?;
    ok(json!({ "data": data }))
}

pub async fn list_all(state: Shared) -> Result<Response, Rejection> {
    let sheets = state.gateway.list_tables().await.map_err(reject)?;
    ok(json!({ "sheets": sheets }))
}

pub async fn inventory(raw_table: String, state: Shared) -> Result<Response, Rejection> {
    let table = decode_segment(&raw_table)?;
    let records = state.gateway.get_records(&table).await.map_err(reject)?;
    debug!(table = %table, records = records.records.len(), "inventory");
    if records.records.is_empty() {
        return ok(json!([{ "headers_only": records.header }]));
    }
    Ok(reply::json(&records.records).into_response())
}

pub async fn inventory_structured(raw_table: String, state: Shared) -> Result<Response, Rejection> {
    let table = decode_segment(&raw_table)?;
    let structured = state.gateway.get_structured(&table).await.map_err(reject)?;
    Ok(reply::json(&structured).into_response())
}

pub async fn inventory_raw(
    raw_table: String,
    query: RawQuery,
    state: Shared,
) -> Result<Response, Rejection> {
    let table = decode_segment(&raw_table)?;
    let values = state
        .gateway
        .get_raw(&table, query.range.as_deref())
        .await
        .map_err(reject)?;
    Ok(reply::json(&values).into_response())
}

pub async fn inventory_item(
    raw_table: String,
    raw_value: String,
    query: ItemQuery,
    state: Shared,
) -> Result<Response, Rejection> {
    let table = decode_segment(&raw_table)?;
    let value = decode_segment(&raw_value)?;
    let key_column = query.key_column.as_deref().filter(|c| !c.is_empty());
    let record = state
        .gateway
        .find_item(&table, &value, key_column)
        .await
        .map_err(reject)?;
    Ok(reply::json(&record).into_response())
}
