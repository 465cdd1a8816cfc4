use async_trait::async_trait;
use std::sync::{PoisonError, RwLock};

use super::{
    a1::A1Range, pad_rows, trim_grid, StoreError, StoreResult, TableInfo, TableStore,
};

#[derive(Debug, Clone)]
struct MemTable {
    title: String,
    row_capacity: u32,
    column_capacity: u32,
    rows: Vec<Vec<String>>,
}

impl MemTable {
    fn info(&self) -> TableInfo {
        TableInfo {
            title: self.title.clone(),
            row_count: self.row_capacity.max(self.rows.len() as u32),
            column_count: self
                .column_capacity
                .max(self.rows.iter().map(Vec::len).max().unwrap_or(0) as u32),
        }
    }
}

/// In-process `TableStore` with the same row semantics as the Sheets backend.
/// Used by the test-suite and by `--in-memory` runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Vec<MemTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table with rows (row 1 being the header).
    pub fn with_table(self, name: &str, rows: Vec<Vec<String>>) -> Self {
        {
            let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
            tables.retain(|t| t.title != name);
            tables.push(MemTable {
                title: name.to_string(),
                row_capacity: super::DEFAULT_ROW_CAPACITY,
                column_capacity: super::DEFAULT_COLUMN_CAPACITY,
                rows,
            });
        }
        self
    }

    /// Raw stored rows, unpadded. `None` if the table does not exist.
    pub fn rows(&self, table: &str) -> Option<Vec<Vec<String>>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.iter().find(|t| t.title == table).map(|t| t.rows.clone())
    }

    fn read<T>(&self, table: &str, f: impl FnOnce(&MemTable) -> T) -> StoreResult<T> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .iter()
            .find(|t| t.title == table)
            .map(f)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }

    fn write<T>(&self, table: &str, f: impl FnOnce(&mut MemTable) -> T) -> StoreResult<T> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables
            .iter_mut()
            .find(|t| t.title == table)
            .map(f)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn list_tables(&self) -> StoreResult<Vec<TableInfo>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.iter().map(MemTable::info).collect())
    }

    async fn get_header(&self, table: &str) -> StoreResult<Vec<String>> {
        self.read(table, |t| {
            let header = t.rows.first().cloned().unwrap_or_default();
            trim_grid(vec![header]).pop().unwrap_or_default()
        })
    }

    async fn delete_header_row(&self, table: &str) -> StoreResult<()> {
        self.write(table, |t| {
            if !t.rows.is_empty() {
                t.rows.remove(0);
            }
        })
    }

    async fn insert_row(&self, table: &str, position: u32, values: &[String]) -> StoreResult<()> {
        self.write(table, |t| {
            let idx = (position.max(1) as usize - 1).min(t.rows.len());
            t.rows.insert(idx, values.to_vec());
        })
    }

    async fn update_row(&self, table: &str, position: u32, values: &[String]) -> StoreResult<()> {
        self.write(table, |t| {
            let idx = position.max(1) as usize - 1;
            if t.rows.len() <= idx {
                t.rows.resize(idx + 1, Vec::new());
            }
            let row = &mut t.rows[idx];
            if row.len() < values.len() {
                row.resize(values.len(), String::new());
            }
            row[..values.len()].clone_from_slice(values);
        })
    }

    async fn append_row(&self, table: &str, values: &[String]) -> StoreResult<()> {
        self.write(table, |t| t.rows.push(values.to_vec()))
    }

    async fn append_rows(&self, table: &str, rows: &[Vec<String>]) -> StoreResult<()> {
        self.write(table, |t| t.rows.extend(rows.iter().cloned()))
    }

    async fn get_all_values(&self, table: &str) -> StoreResult<Vec<Vec<String>>> {
        self.read(table, |t| pad_rows(trim_grid(t.rows.clone())))
    }

    async fn get_range(&self, table: &str, range: &str) -> StoreResult<Vec<Vec<String>>> {
        let bounds = A1Range::parse(range)
            .ok_or_else(|| StoreError::Api {
                status: 400,
                message: format!("Unable to parse range: {}", range),
            })?
            .bounds();

        self.read(table, |t| {
            let rows = t
                .rows
                .iter()
                .enumerate()
                .filter(|(i, _)| {
                    let i = *i as u32;
                    i >= bounds.first_row && bounds.last_row.map_or(true, |last| i <= last)
                })
                .map(|(_, row)| {
                    row.iter()
                        .enumerate()
                        .filter(|(j, _)| {
                            let j = *j as u32;
                            j >= bounds.first_column
                                && bounds.last_column.map_or(true, |last| j <= last)
                        })
                        .map(|(_, cell)| cell.clone())
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>();
            trim_grid(rows)
        })
    }

    async fn clear(&self, table: &str) -> StoreResult<()> {
        self.write(table, |t| t.rows.clear())
    }

    async fn create_table(&self, name: &str, rows: u32, columns: u32) -> StoreResult<()> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if tables.iter().any(|t| t.title == name) {
            return Err(name_taken(name));
        }
        tables.push(MemTable {
            title: name.to_string(),
            row_capacity: rows,
            column_capacity: columns,
            rows: Vec::new(),
        });
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let before = tables.len();
        tables.retain(|t| t.title != table);
        if tables.len() == before {
            return Err(StoreError::TableNotFound(table.to_string()));
        }
        Ok(())
    }

    async fn rename_table(&self, table: &str, new_name: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if !tables.iter().any(|t| t.title == table) {
            return Err(StoreError::TableNotFound(table.to_string()));
        }
        if table != new_name && tables.iter().any(|t| t.title == new_name) {
            return Err(name_taken(new_name));
        }
        if let Some(t) = tables.iter_mut().find(|t| t.title == table) {
            t.title = new_name.to_string();
        }
        Ok(())
    }
}

fn name_taken(name: &str) -> StoreError {
    StoreError::Api {
        status: 400,
        message: format!(
            "A sheet with the name \"{}\" already exists. Please enter another name.",
            name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn header_is_trimmed_and_missing_table_errors() {
        let store =
            MemoryStore::new().with_table("Stock", vec![row(&["name", "qty", ""]), row(&["bolt"])]);
        assert_eq!(store.get_header("Stock").await.unwrap(), row(&["name", "qty"]));
        assert!(matches!(
            store.get_header("Nope").await,
            Err(StoreError::TableNotFound(t)) if t == "Nope"
        ));
    }

    #[tokio::test]
    async fn insert_and_update_rows() {
        let store = MemoryStore::new().with_table("T", vec![row(&["a"]), row(&["1"])]);
        store.insert_row("T", 1, &row(&["h"])).await.unwrap();
        store.update_row("T", 2, &row(&["a", "b"])).await.unwrap();
        assert_eq!(
            store.rows("T").unwrap(),
            vec![row(&["h"]), row(&["a", "b"]), row(&["1"])]
        );
    }

    #[tokio::test]
    async fn all_values_are_padded() {
        let store = MemoryStore::new().with_table("T", vec![row(&["a", "b"]), row(&["1"])]);
        assert_eq!(
            store.get_all_values("T").await.unwrap(),
            vec![row(&["a", "b"]), row(&["1", ""])]
        );
    }

    #[tokio::test]
    async fn range_reads_slice_the_grid() {
        let store = MemoryStore::new().with_table(
            "T",
            vec![row(&["a", "b", "c"]), row(&["1", "2", "3"]), row(&["4", "5"])],
        );
        assert_eq!(
            store.get_range("T", "B1:C2").await.unwrap(),
            vec![row(&["b", "c"]), row(&["2", "3"])]
        );
        assert_eq!(
            store.get_range("T", "C:C").await.unwrap(),
            vec![row(&["c"]), row(&["3"])]
        );
    }

    #[tokio::test]
    async fn create_rename_delete() {
        let store = MemoryStore::new();
        store.create_table("A", 10, 5).await.unwrap();
        assert!(store.create_table("A", 10, 5).await.is_err());
        store.rename_table("A", "B").await.unwrap();
        let names: Vec<_> = store
            .list_tables()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(names, vec!["B".to_string()]);
        store.delete_table("B").await.unwrap();
        assert!(matches!(
            store.rename_table("B", "C").await,
            Err(StoreError::TableNotFound(_))
        ));
        assert!(matches!(
            store.delete_table("B").await,
            Err(StoreError::TableNotFound(_))
        ));
    }

    #[tokio::test]
    async fn rename_onto_existing_title_is_refused() {
        let store = MemoryStore::new()
            .with_table("A", vec![row(&["a"])])
            .with_table("B", vec![row(&["b"])]);
        assert!(matches!(
            store.rename_table("A", "B").await,
            Err(StoreError::Api { status: 400, .. })
        ));
        assert_eq!(store.rows("A").unwrap(), vec![row(&["a"])]);
        assert_eq!(store.rows("B").unwrap(), vec![row(&["b"])]);
        store.rename_table("A", "A").await.unwrap();
    }
}
