// src/store/sheets.rs

//! `TableStore` backed by the Google Sheets v4 REST API.
//!
//! Every operation resolves the worksheet by title first, so a missing table
//! surfaces as `StoreError::TableNotFound` instead of an opaque range error.
//! Nothing is cached between calls.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use super::{a1::quote_title, pad_rows, trim_grid, StoreError, StoreResult, TableInfo, TableStore};

pub const SHEETS_API_ROOT: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

const SHEET_FIELDS: &str = "sheets.properties(sheetId,title,gridProperties(rowCount,columnCount))";

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
    #[serde(default)]
    grid_properties: GridProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    row_count: u32,
    #[serde(default)]
    column_count: u32,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl From<&SheetProperties> for TableInfo {
    fn from(p: &SheetProperties) -> Self {
        TableInfo {
            title: p.title.clone(),
            row_count: p.grid_properties.row_count,
            column_count: p.grid_properties.column_count,
        }
    }
}

/// One spreadsheet, addressed by id, accessed with a bearer token.
pub struct SheetsStore {
    client: Client,
    root: Url,
    spreadsheet_id: String,
    token: SecretString,
}

impl SheetsStore {
    pub fn new(
        client: Client,
        spreadsheet_id: impl Into<String>,
        token: SecretString,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            root: Url::parse(SHEETS_API_ROOT)?,
            spreadsheet_id: spreadsheet_id.into(),
            token,
        })
    }

    fn url(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = self.root.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Decode(format!("{} cannot be a base URL", self.root)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, %url, "sheets request");
        self.client
            .request(method, url)
            .bearer_auth(self.token.expose_secret())
    }

    async fn properties(&self, table: &str) -> StoreResult<SheetProperties> {
        self.all_properties()
            .await?
            .into_iter()
            .find(|p| p.title == table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }

    async fn all_properties(&self) -> StoreResult<Vec<SheetProperties>> {
        let url = self.url(&[self.spreadsheet_id.as_str()])?;
        let resp = self
            .request(Method::GET, url)
            .query(&[("fields", SHEET_FIELDS)])
            .send()
            .await?;
        let doc: Spreadsheet = decode(check(resp).await?).await?;
        Ok(doc.sheets.into_iter().map(|s| s.properties).collect())
    }

    async fn batch_update(&self, requests: Vec<Value>) -> StoreResult<()> {
        let segment = format!("{}:batchUpdate", self.spreadsheet_id);
        let url = self.url(&[segment.as_str()])?;
        let resp = self
            .request(Method::POST, url)
            .json(&json!({ "requests": requests }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn values_get(&self, range: &str) -> StoreResult<Vec<Vec<String>>> {
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", range])?;
        let resp = self
            .request(Method::GET, url)
            .query(&[("majorDimension", "ROWS")])
            .send()
            .await?;
        let body: ValueRange = decode(check(resp).await?).await?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }

    async fn values_update(&self, range: &str, rows: &[Vec<String>]) -> StoreResult<()> {
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", range])?;
        let resp = self
            .request(Method::PUT, url)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "majorDimension": "ROWS", "values": rows }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// Grow the grid so that `width` columns fit; the values API refuses
    /// writes beyond the grid.
    async fn ensure_width(&self, props: &SheetProperties, width: usize) -> StoreResult<()> {
        let have = props.grid_properties.column_count as usize;
        if width <= have {
            return Ok(());
        }
        debug!(table = %props.title, have, width, "appending columns");
        self.batch_update(vec![json!({
            "appendDimension": {
                "sheetId": props.sheet_id,
                "dimension": "COLUMNS",
                "length": width - have,
            }
        })])
        .await
    }
}

#[async_trait]
impl TableStore for SheetsStore {
    async fn list_tables(&self) -> StoreResult<Vec<TableInfo>> {
        Ok(self.all_properties().await?.iter().map(TableInfo::from).collect())
    }

    async fn table_info(&self, table: &str) -> StoreResult<TableInfo> {
        Ok(TableInfo::from(&self.properties(table).await?))
    }

    async fn get_header(&self, table: &str) -> StoreResult<Vec<String>> {
        let props = self.properties(table).await?;
        let range = format!("{}!1:1", quote_title(&props.title));
        Ok(trim_grid(self.values_get(&range).await?)
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    async fn delete_header_row(&self, table: &str) -> StoreResult<()> {
        let props = self.properties(table).await?;
        self.batch_update(vec![json!({
            "deleteDimension": {
                "range": {
                    "sheetId": props.sheet_id,
                    "dimension": "ROWS",
                    "startIndex": 0,
                    "endIndex": 1,
                }
            }
        })])
        .await
    }

    async fn insert_row(&self, table: &str, position: u32, values: &[String]) -> StoreResult<()> {
        let props = self.properties(table).await?;
        let position = position.max(1);
        self.ensure_width(&props, values.len()).await?;
        self.batch_update(vec![json!({
            "insertDimension": {
                "range": {
                    "sheetId": props.sheet_id,
                    "dimension": "ROWS",
                    "startIndex": position - 1,
                    "endIndex": position,
                },
                "inheritFromBefore": position > 1,
            }
        })])
        .await?;
        let range = format!("{}!A{}", quote_title(&props.title), position);
        self.values_update(&range, &[values.to_vec()]).await
    }

    async fn update_row(&self, table: &str, position: u32, values: &[String]) -> StoreResult<()> {
        let props = self.properties(table).await?;
        self.ensure_width(&props, values.len()).await?;
        let range = format!("{}!A{}", quote_title(&props.title), position.max(1));
        self.values_update(&range, &[values.to_vec()]).await
    }

    async fn append_row(&self, table: &str, values: &[String]) -> StoreResult<()> {
        self.append_rows(table, &[values.to_vec()]).await
    }

    async fn append_rows(&self, table: &str, rows: &[Vec<String>]) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let props = self.properties(table).await?;
        self.ensure_width(&props, rows.iter().map(Vec::len).max().unwrap_or(0))
            .await?;
        let segment = format!("{}!A1:append", quote_title(&props.title));
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", segment.as_str()])?;
        let resp = self
            .request(Method::POST, url)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "majorDimension": "ROWS", "values": rows }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn get_all_values(&self, table: &str) -> StoreResult<Vec<Vec<String>>> {
        let props = self.properties(table).await?;
        let rows = self.values_get(&quote_title(&props.title)).await?;
        Ok(pad_rows(trim_grid(rows)))
    }

    async fn get_range(&self, table: &str, range: &str) -> StoreResult<Vec<Vec<String>>> {
        let props = self.properties(table).await?;
        let range = format!("{}!{}", quote_title(&props.title), range);
        Ok(trim_grid(self.values_get(&range).await?))
    }

    async fn clear(&self, table: &str) -> StoreResult<()> {
        let props = self.properties(table).await?;
        let segment = format!("{}:clear", quote_title(&props.title));
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", segment.as_str()])?;
        let resp = self.request(Method::POST, url).json(&json!({})).send().await?;
        check(resp).await?;
        Ok(())
    }

    async fn create_table(&self, name: &str, rows: u32, columns: u32) -> StoreResult<()> {
        self.batch_update(vec![json!({
            "addSheet": {
                "properties": {
                    "title": name,
                    "gridProperties": { "rowCount": rows, "columnCount": columns },
                }
            }
        })])
        .await
    }

    async fn delete_table(&self, table: &str) -> StoreResult<()> {
        let props = self.properties(table).await?;
        self.batch_update(vec![json!({ "deleteSheet": { "sheetId": props.sheet_id } })])
            .await
    }

    async fn rename_table(&self, table: &str, new_name: &str) -> StoreResult<()> {
        let props = self.properties(table).await?;
        self.batch_update(vec![json!({
            "updateSheetProperties": {
                "properties": { "sheetId": props.sheet_id, "title": new_name },
                "fields": "title",
            }
        })])
        .await
    }
}

async fn check(resp: Response) -> StoreResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Api {
        status: status.as_u16(),
        message: api_message(&body),
    })
}

async fn decode<T: serde::de::DeserializeOwned>(resp: Response) -> StoreResult<T> {
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Decode(e.to_string()))
}

/// Pull `error.message` out of a Google API error body, falling back to the
/// raw text.
pub(crate) fn api_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

fn cell_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SheetsStore {
        SheetsStore::new(
            Client::new(),
            "abc123",
            SecretString::new("token".to_string().into_boxed_str()),
        )
        .unwrap()
    }

    #[test]
    fn builds_encoded_value_urls() {
        let s = store();
        let range = format!("{}!1:1", quote_title("3.3 Test Sandbox"));
        let url = s.url(&["abc123", "values", range.as_str()]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/'3.3%20Test%20Sandbox'!1:1"
        );

        let batch = s.url(&["abc123:batchUpdate"]).unwrap();
        assert_eq!(
            batch.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123:batchUpdate"
        );
    }

    #[test]
    fn slashes_in_titles_stay_in_one_segment() {
        let s = store();
        let url = s.url(&["abc123", "values", "'a/b'"]).unwrap();
        assert!(url.as_str().ends_with("/values/'a%2Fb'"));
    }

    #[test]
    fn extracts_api_error_message() {
        let body = r#"{"error":{"code":400,"message":"Unable to parse range: Nope!1:1","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(api_message(body), "Unable to parse range: Nope!1:1");
        assert_eq!(api_message("  upstream exploded \n"), "upstream exploded");
    }

    #[test]
    fn decodes_sheet_properties() {
        let body = r#"{"sheets":[{"properties":{"sheetId":7,"title":"Stock","gridProperties":{"rowCount":1000,"columnCount":26}}},{"properties":{"sheetId":8,"title":"Empty"}}]}"#;
        let doc: Spreadsheet = serde_json::from_str(body).unwrap();
        let infos: Vec<TableInfo> = doc.sheets.iter().map(|s| TableInfo::from(&s.properties)).collect();
        assert_eq!(infos[0].title, "Stock");
        assert_eq!(infos[0].row_count, 1000);
        assert_eq!(infos[1].column_count, 0);
        assert_eq!(doc.sheets[0].properties.sheet_id, 7);
    }

    #[test]
    fn cells_are_stringified() {
        let body = r#"{"range":"Stock!A1:C2","values":[["name",5,true],[null]]}"#;
        let vr: ValueRange = serde_json::from_str(body).unwrap();
        let rows: Vec<Vec<String>> = vr
            .values
            .into_iter()
            .map(|r| r.iter().map(cell_to_string).collect())
            .collect();
        assert_eq!(rows[0], vec!["name", "5", "true"]);
        assert_eq!(rows[1], vec![""]);
    }
}
