// src/store/mod.rs

//! The spreadsheet collaborator. A `TableStore` owns named tables whose first
//! row is the header; everything above it (header reconciliation, lookups,
//! restructuring) lives in `crate::gateway`.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub mod a1;
pub mod memory;
pub mod sheets;

pub use a1::A1Range;
pub use memory::MemoryStore;
pub use sheets::SheetsStore;

/// Row/column capacity used when the caller does not pick one.
pub const DEFAULT_ROW_CAPACITY: u32 = 1000;
pub const DEFAULT_COLUMN_CAPACITY: u32 = 26;

/// Metadata for one table (a worksheet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub title: String,
    /// Grid capacity, not the number of populated rows.
    pub row_count: u32,
    pub column_count: u32,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Sheet '{0}' not found")]
    TableNotFound(String),

    #[error("store returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected store response: {0}")]
    Decode(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Operations consumed from the remote spreadsheet.
///
/// Row positions are 1-based, matching spreadsheet row numbers. Reads return
/// plain strings; `get_all_values` pads every row to the widest row.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn list_tables(&self) -> StoreResult<Vec<TableInfo>>;

    async fn table_info(&self, table: &str) -> StoreResult<TableInfo> {
        self.list_tables()
            .await?
            .into_iter()
            .find(|t| t.title == table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }

    /// Row 1 without trailing empty cells. An empty table yields `[]`.
    async fn get_header(&self, table: &str) -> StoreResult<Vec<String>>;

    async fn delete_header_row(&self, table: &str) -> StoreResult<()>;

    async fn insert_row(&self, table: &str, position: u32, values: &[String]) -> StoreResult<()>;

    /// Overwrite the cells of one row starting at column A.
    async fn update_row(&self, table: &str, position: u32, values: &[String]) -> StoreResult<()>;

    async fn append_row(&self, table: &str, values: &[String]) -> StoreResult<()>;

    async fn append_rows(&self, table: &str, rows: &[Vec<String>]) -> StoreResult<()> {
        for row in rows {
            self.append_row(table, row).await?;
        }
        Ok(())
    }

    async fn get_all_values(&self, table: &str) -> StoreResult<Vec<Vec<String>>>;

    /// Values inside an A1 range (sheet-relative, e.g. `A1:Z100`). Trailing
    /// empty rows and cells are omitted.
    async fn get_range(&self, table: &str, range: &str) -> StoreResult<Vec<Vec<String>>>;

    async fn clear(&self, table: &str) -> StoreResult<()>;

    async fn create_table(&self, name: &str, rows: u32, columns: u32) -> StoreResult<()>;

    async fn delete_table(&self, table: &str) -> StoreResult<()>;

    async fn rename_table(&self, table: &str, new_name: &str) -> StoreResult<()>;
}

/// Pad every row with empty cells up to the widest row.
pub(crate) fn pad_rows(mut rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in rows.iter_mut() {
        row.resize(width, String::new());
    }
    rows
}

/// Drop trailing empty cells from each row and trailing empty rows.
pub(crate) fn trim_grid(rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = rows
        .into_iter()
        .map(|mut row| {
            while row.last().map_or(false, |c| c.is_empty()) {
                row.pop();
            }
            row
        })
        .collect();
    while rows.last().map_or(false, |r| r.is_empty()) {
        rows.pop();
    }
    rows
}
