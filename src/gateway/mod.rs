// src/gateway/mod.rs

//! Sheet Gateway: spreadsheet worksheets treated as tables whose first row is
//! the header. Every call re-reads the store; nothing is cached.

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{GatewayError, Result};
use crate::store::{A1Range, TableStore, DEFAULT_COLUMN_CAPACITY, DEFAULT_ROW_CAPACITY};

pub mod evolution;
pub mod locks;

pub use evolution::{reconcile, Reconciled};
pub use locks::TableLocks;

/// How a grown header is written back to row 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum HeaderPolicy {
    /// Delete row 1, then insert the new header as row 1 (two store calls).
    #[default]
    DeleteInsert,
    /// Overwrite row 1 in place (one store call).
    Overwrite,
}

/// Header and data rows of a table, split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Structured {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Data rows zipped with the header.
#[derive(Debug, Clone, PartialEq)]
pub struct Records {
    pub header: Vec<String>,
    pub records: Vec<Map<String, Value>>,
}

pub struct SheetGateway {
    store: Arc<dyn TableStore>,
    policy: HeaderPolicy,
    /// `None` disables in-process serialization of header mutations.
    locks: Option<TableLocks>,
}

impl SheetGateway {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
            policy: HeaderPolicy::default(),
            locks: Some(TableLocks::new()),
        }
    }

    pub fn with_policy(mut self, policy: HeaderPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_serialized_writes(mut self, enabled: bool) -> Self {
        self.locks = enabled.then(TableLocks::new);
        self
    }

    async fn guard(&self, table: &str) -> Option<tokio::sync::OwnedMutexGuard<()>> {
        match &self.locks {
            Some(locks) => Some(locks.acquire(table).await),
            None => None,
        }
    }

    /// Append `record` as a new row, first growing the header with any field
    /// it has not seen. Returns the row as written.
    pub async fn append_record(&self, table: &str, record: &Map<String, Value>) -> Result<Vec<String>> {
        require_name(table, "sheet_name")?;
        if record.keys().any(|k| k.is_empty()) {
            return Err(GatewayError::bad_request("Field names must not be empty"));
        }
        debug!(table, fields = record.len(), "append_record");
        let _guard = self.guard(table).await;

        // 1) fresh header
        let header = self
            .store
            .get_header(table)
            .await
            .map_err(GatewayError::write)?;

        // 2) lay the record out, growing the header if needed
        let plan = reconcile(&header, record);
        if plan.header_changed() {
            info!(table, added = ?plan.added, policy = ?self.policy, "extending header");
            self.write_header(table, &plan.header).await?;
        }

        // 3) append
        self.store
            .append_row(table, &plan.row)
            .await
            .map_err(GatewayError::write)?;
        debug!(table, cells = plan.row.len(), "row appended");
        Ok(plan.row)
    }

    async fn write_header(&self, table: &str, header: &[String]) -> Result<()> {
        match self.policy {
            HeaderPolicy::DeleteInsert => {
                self.store
                    .delete_header_row(table)
                    .await
                    .map_err(GatewayError::write)?;
                self.store
                    .insert_row(table, 1, header)
                    .await
                    .map_err(GatewayError::write)
            }
            HeaderPolicy::Overwrite => self
                .store
                .update_row(table, 1, header)
                .await
                .map_err(GatewayError::write),
        }
    }

    /// Clear the whole table and write `headers` as its only row.
    pub async fn replace_all_and_set_header(&self, table: &str, headers: &[String]) -> Result<()> {
        require_name(table, "sheet_name")?;
        validate_header(headers)?;
        debug!(table, columns = headers.len(), "replace_all_and_set_header");
        let _guard = self.guard(table).await;

        self.store.clear(table).await.map_err(GatewayError::write)?;
        self.store
            .insert_row(table, 1, headers)
            .await
            .map_err(GatewayError::write)?;
        info!(table, columns = headers.len(), "table cleared and header set");
        Ok(())
    }

    /// Replace only row 1 with `headers`; data rows stay where they are.
    pub async fn overwrite_header_row(&self, table: &str, headers: &[String]) -> Result<()> {
        require_name(table, "sheet_name")?;
        validate_header(headers)?;
        debug!(table, columns = headers.len(), "overwrite_header_row");
        let _guard = self.guard(table).await;

        // a blank row 1 above data is still a row to replace; only a wholly
        // empty table skips the delete
        let values = self
            .store
            .get_all_values(table)
            .await
            .map_err(GatewayError::write)?;
        if !values.is_empty() {
            self.store
                .delete_header_row(table)
                .await
                .map_err(GatewayError::write)?;
        }
        self.store
            .insert_row(table, 1, headers)
            .await
            .map_err(GatewayError::write)?;
        info!(table, columns = headers.len(), "header row overwritten");
        Ok(())
    }

    /// Drop the named columns from the header and every data row, then
    /// rewrite the table. Names not in the header are ignored.
    pub async fn restructure(&self, table: &str, remove_columns: &[String]) -> Result<Structured> {
        require_name(table, "sheet_name")?;
        debug!(table, removing = ?remove_columns, "restructure");
        let _guard = self.guard(table).await;

        let values = self
            .store
            .get_all_values(table)
            .await
            .map_err(GatewayError::write)?;
        let Some((header, rows)) = values.split_first() else {
            return Err(GatewayError::EmptyTable(table.to_string()));
        };

        let (headers, rows) = evolution::drop_columns(header, rows, remove_columns);

        self.store.clear(table).await.map_err(GatewayError::write)?;
        let mut rewrite = Vec::with_capacity(rows.len() + 1);
        rewrite.push(headers.clone());
        rewrite.extend(rows.iter().cloned());
        self.store
            .append_rows(table, &rewrite)
            .await
            .map_err(GatewayError::write)?;

        info!(
            table,
            removed = ?remove_columns,
            columns = headers.len(),
            rows = rows.len(),
            "table restructured"
        );
        Ok(Structured { headers, rows })
    }

    pub async fn get_headers(&self, table: &str) -> Result<Vec<String>> {
        require_name(table, "sheet_name")?;
        debug!(table, "get_headers");
        self.store.get_header(table).await.map_err(GatewayError::read)
    }

    /// Every row including the header, padded to equal width.
    pub async fn get_all(&self, table: &str) -> Result<Vec<Vec<String>>> {
        require_name(table, "sheet_name")?;
        debug!(table, "get_all");
        self.store.get_all_values(table).await.map_err(GatewayError::read)
    }

    pub async fn get_structured(&self, table: &str) -> Result<Structured> {
        debug!(table, "get_structured");
        let mut values = self.get_all(table).await?;
        if values.is_empty() {
            return Ok(Structured {
                headers: Vec::new(),
                rows: Vec::new(),
            });
        }
        let headers = values.remove(0);
        Ok(Structured {
            headers,
            rows: values,
        })
    }

    pub async fn get_records(&self, table: &str) -> Result<Records> {
        debug!(table, "get_records");
        let values = self.get_all(table).await?;
        let header = values
            .first()
            .map(|h| evolution::trim_header(h))
            .unwrap_or_default();
        let records = values
            .iter()
            .skip(1)
            .map(|row| evolution::zip_record(&header, row))
            .collect();
        Ok(Records { header, records })
    }

    /// Values inside `range`, or `A1:Z<row capacity>` when no range is given.
    pub async fn get_raw(&self, table: &str, range: Option<&str>) -> Result<Vec<Vec<String>>> {
        require_name(table, "sheet_name")?;
        debug!(table, ?range, "get_raw");
        let range = match range.map(str::trim).filter(|r| !r.is_empty()) {
            Some(r) => {
                if A1Range::parse(r).is_none() {
                    return Err(GatewayError::bad_request(format!("Invalid range '{}'", r)));
                }
                r.to_string()
            }
            None => {
                let info = self.store.table_info(table).await.map_err(GatewayError::read)?;
                format!("A1:Z{}", info.row_count.max(1))
            }
        };
        debug!(table, %range, "reading range");
        self.store
            .get_range(table, &range)
            .await
            .map_err(GatewayError::read)
    }

    /// First record whose `key_column` (or, without one, any field) equals
    /// `value`, ignoring case.
    pub async fn find_item(
        &self,
        table: &str,
        value: &str,
        key_column: Option<&str>,
    ) -> Result<Map<String, Value>> {
        debug!(table, value, ?key_column, "find_item");
        let Records { header, records } = self.get_records(table).await?;
        if records.is_empty() {
            return Err(GatewayError::NotFound("No data in sheet.".into()));
        }
        if let Some(column) = key_column {
            if !header.iter().any(|h| h == column) {
                return Err(GatewayError::NotFound("Item not found".into()));
            }
        }
        records
            .into_iter()
            .find(|r| evolution::record_matches(r, value, key_column))
            .ok_or_else(|| GatewayError::NotFound("Item not found".into()))
    }

    pub async fn list_tables(&self) -> Result<Vec<String>> {
        debug!("list_tables");
        Ok(self
            .store
            .list_tables()
            .await
            .map_err(GatewayError::read)?
            .into_iter()
            .map(|t| t.title)
            .collect())
    }

    pub async fn create_table(&self, name: &str, headers: &[String]) -> Result<()> {
        require_name(name, "sheet_name")?;
        if !headers.is_empty() {
            validate_header(headers)?;
        }
        debug!(table = name, columns = headers.len(), "create_table");
        self.store
            .create_table(name, DEFAULT_ROW_CAPACITY, DEFAULT_COLUMN_CAPACITY)
            .await
            .map_err(GatewayError::write)?;
        if !headers.is_empty() {
            self.store
                .insert_row(name, 1, headers)
                .await
                .map_err(GatewayError::write)?;
        }
        info!(table = name, columns = headers.len(), "table created");
        Ok(())
    }

    pub async fn delete_table(&self, name: &str) -> Result<()> {
        require_name(name, "sheet_name")?;
        debug!(table = name, "delete_table");
        self.store.delete_table(name).await.map_err(GatewayError::write)?;
        info!(table = name, "table deleted");
        Ok(())
    }

    pub async fn rename_table(&self, old_name: &str, new_name: &str) -> Result<()> {
        require_name(old_name, "old_name")?;
        require_name(new_name, "new_name")?;
        debug!(from = old_name, to = new_name, "rename_table");
        self.store
            .rename_table(old_name, new_name)
            .await
            .map_err(GatewayError::write)?;
        info!(from = old_name, to = new_name, "table renamed");
        Ok(())
    }
}

fn require_name(name: &str, field: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(GatewayError::bad_request(format!("Missing {}", field)));
    }
    Ok(())
}

fn validate_header(headers: &[String]) -> Result<()> {
    if headers.is_empty() {
        return Err(GatewayError::bad_request("headers must not be empty"));
    }
    if let Some(dup) = evolution::first_duplicate(headers) {
        return Err(GatewayError::bad_request(format!(
            "Duplicate header '{}'",
            dup
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError, StoreResult, TableInfo};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn record(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn stock() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new().with_table(
            "Stock",
            vec![
                strings(&["name", "qty"]),
                strings(&["bolt", "5"]),
                strings(&["Nut", "12"]),
            ],
        ))
    }

    fn gateway(store: Arc<MemoryStore>) -> SheetGateway {
        SheetGateway::new(store)
    }

    #[tokio::test]
    async fn append_with_known_fields() {
        let store = stock();
        let gw = gateway(store.clone());
        let row = gw
            .append_record("Stock", &record(json!({"qty": "7", "name": "washer"})))
            .await
            .unwrap();
        assert_eq!(row, strings(&["washer", "7"]));
        let rows = store.rows("Stock").unwrap();
        assert_eq!(rows[0], strings(&["name", "qty"]));
        assert_eq!(rows.last().unwrap(), &strings(&["washer", "7"]));
        assert_eq!(rows.len(), 4);
    }

    #[tokio::test]
    async fn append_missing_field_is_blank() {
        let store = stock();
        let gw = gateway(store.clone());
        let row = gw
            .append_record("Stock", &record(json!({"name": "rivet"})))
            .await
            .unwrap();
        assert_eq!(row, strings(&["rivet", ""]));
    }

    #[tokio::test]
    async fn append_grows_header_under_both_policies() {
        for policy in [HeaderPolicy::DeleteInsert, HeaderPolicy::Overwrite] {
            let store = stock();
            let gw = gateway(store.clone()).with_policy(policy);
            let row = gw
                .append_record("Stock", &record(json!({"name": "bolt", "price": "1.50"})))
                .await
                .unwrap();
            assert_eq!(row, strings(&["bolt", "", "1.50"]));

            let rows = store.rows("Stock").unwrap();
            assert_eq!(rows[0], strings(&["name", "qty", "price"]), "{policy:?}");
            // existing data rows untouched
            assert_eq!(rows[1], strings(&["bolt", "5"]));
            assert_eq!(rows[2], strings(&["Nut", "12"]));
            assert_eq!(rows[3], strings(&["bolt", "", "1.50"]));
        }
    }

    #[tokio::test]
    async fn append_into_empty_table_creates_header() {
        let store = Arc::new(MemoryStore::new().with_table("Log", vec![]));
        let gw = gateway(store.clone());
        gw.append_record("Log", &record(json!({"event": "start", "ok": true})))
            .await
            .unwrap();
        assert_eq!(
            store.rows("Log").unwrap(),
            vec![strings(&["event", "ok"]), strings(&["start", "true"])]
        );
    }

    #[tokio::test]
    async fn append_to_missing_table() {
        let gw = gateway(stock());
        let err = gw
            .append_record("Nope", &record(json!({"a": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::TableNotFound(t) if t == "Nope"));
    }

    #[tokio::test]
    async fn append_rejects_blank_names() {
        let gw = gateway(stock());
        assert!(matches!(
            gw.append_record("", &record(json!({"a": 1}))).await,
            Err(GatewayError::BadRequest(_))
        ));
        assert!(matches!(
            gw.append_record("Stock", &record(json!({"": 1}))).await,
            Err(GatewayError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_appends_keep_every_new_column() {
        let store = stock();
        let gw = Arc::new(gateway(store.clone()));
        let mut handles = Vec::new();
        for i in 0..8 {
            let gw = Arc::clone(&gw);
            handles.push(tokio::spawn(async move {
                let field = format!("extra_{}", i);
                gw.append_record("Stock", &record(json!({ "name": "x", field: "y" })))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let header = store.rows("Stock").unwrap()[0].clone();
        assert_eq!(header.len(), 2 + 8);
        for i in 0..8 {
            assert!(header.contains(&format!("extra_{}", i)));
        }
    }

    #[tokio::test]
    async fn set_header_variants() {
        let store = stock();
        let gw = gateway(store.clone());

        gw.overwrite_header_row("Stock", &strings(&["item", "count"]))
            .await
            .unwrap();
        assert_eq!(
            store.rows("Stock").unwrap(),
            vec![
                strings(&["item", "count"]),
                strings(&["bolt", "5"]),
                strings(&["Nut", "12"]),
            ]
        );

        gw.replace_all_and_set_header("Stock", &strings(&["sku"]))
            .await
            .unwrap();
        assert_eq!(store.rows("Stock").unwrap(), vec![strings(&["sku"])]);

        assert!(matches!(
            gw.replace_all_and_set_header("Stock", &strings(&["a", "a"])).await,
            Err(GatewayError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn overwrite_replaces_blank_header_above_data() {
        let store = Arc::new(
            MemoryStore::new()
                .with_table("T", vec![vec![], strings(&["bolt", "5"])])
                .with_table("Empty", vec![]),
        );
        let gw = gateway(store.clone());

        gw.overwrite_header_row("T", &strings(&["name", "qty"]))
            .await
            .unwrap();
        assert_eq!(
            store.rows("T").unwrap(),
            vec![strings(&["name", "qty"]), strings(&["bolt", "5"])]
        );

        gw.overwrite_header_row("Empty", &strings(&["a"])).await.unwrap();
        assert_eq!(store.rows("Empty").unwrap(), vec![strings(&["a"])]);
    }

    #[tokio::test]
    async fn restructure_drops_columns_and_is_idempotent() {
        let store = Arc::new(MemoryStore::new().with_table(
            "T",
            vec![
                strings(&["a", "b", "c"]),
                strings(&["1", "2", "3"]),
                strings(&["4", "5", "6"]),
            ],
        ));
        let gw = gateway(store.clone());
        let remove = strings(&["b"]);

        let once = gw.restructure("T", &remove).await.unwrap();
        assert_eq!(once.headers, strings(&["a", "c"]));
        assert_eq!(once.rows, vec![strings(&["1", "3"]), strings(&["4", "6"])]);

        let twice = gw.restructure("T", &remove).await.unwrap();
        assert_eq!(once, twice);
        assert_eq!(
            store.rows("T").unwrap(),
            vec![strings(&["a", "c"]), strings(&["1", "3"]), strings(&["4", "6"])]
        );
    }

    #[tokio::test]
    async fn restructure_empty_table() {
        let store = Arc::new(MemoryStore::new().with_table("Empty", vec![]));
        let err = gateway(store).restructure("Empty", &strings(&["a"])).await.unwrap_err();
        assert!(matches!(err, GatewayError::EmptyTable(_)));
    }

    #[tokio::test]
    async fn structured_views() {
        let store = Arc::new(
            MemoryStore::new()
                .with_table(
                    "Stock",
                    vec![
                        strings(&["name", "qty"]),
                        strings(&["bolt", "5"]),
                        strings(&["Nut", "12"]),
                    ],
                )
                .with_table("Empty", vec![]),
        );
        let gw = gateway(store);

        let s = gw.get_structured("Stock").await.unwrap();
        assert_eq!(s.headers, strings(&["name", "qty"]));
        assert_eq!(s.rows.len(), 2);

        let empty = gw.get_structured("Empty").await.unwrap();
        assert!(empty.headers.is_empty());
        assert!(empty.rows.is_empty());

        let recs = gw.get_records("Stock").await.unwrap();
        assert_eq!(
            Value::Object(recs.records[1].clone()),
            json!({"name": "Nut", "qty": "12"})
        );
    }

    #[tokio::test]
    async fn raw_ranges() {
        let gw = gateway(stock());
        let all = gw.get_raw("Stock", None).await.unwrap();
        assert_eq!(all.len(), 3);
        let col = gw.get_raw("Stock", Some("B1:B2")).await.unwrap();
        assert_eq!(col, vec![strings(&["qty"]), strings(&["5"])]);
        assert!(matches!(
            gw.get_raw("Stock", Some("nonsense")).await,
            Err(GatewayError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn find_item_rules() {
        let gw = gateway(stock());

        let hit = gw.find_item("Stock", "NUT", Some("name")).await.unwrap();
        assert_eq!(Value::Object(hit), json!({"name": "Nut", "qty": "12"}));

        let any = gw.find_item("Stock", "5", None).await.unwrap();
        assert_eq!(any.get("name"), Some(&json!("bolt")));

        // value matches, but only in another column
        assert!(matches!(
            gw.find_item("Stock", "5", Some("name")).await,
            Err(GatewayError::NotFound(_))
        ));
        // column names are exact
        assert!(matches!(
            gw.find_item("Stock", "Nut", Some("Name")).await,
            Err(GatewayError::NotFound(_))
        ));
        // a missing column never matches, not even an empty value
        assert!(matches!(
            gw.find_item("Stock", "", Some("price")).await,
            Err(GatewayError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn find_item_in_header_only_table() {
        let store = Arc::new(MemoryStore::new().with_table("H", vec![strings(&["a"])]));
        let err = gateway(store).find_item("H", "x", None).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(m) if m == "No data in sheet."));
    }

    #[tokio::test]
    async fn table_admin() {
        let store = Arc::new(MemoryStore::new());
        let gw = gateway(store.clone());
        gw.create_table("New", &strings(&["x", "y"])).await.unwrap();
        assert_eq!(gw.get_headers("New").await.unwrap(), strings(&["x", "y"]));
        gw.rename_table("New", "Renamed").await.unwrap();
        assert_eq!(gw.list_tables().await.unwrap(), strings(&["Renamed"]));
        gw.delete_table("Renamed").await.unwrap();
        assert!(matches!(
            gw.delete_table("Renamed").await,
            Err(GatewayError::TableNotFound(_))
        ));
    }

    /// Fails every append; reads pass through to an inner store.
    struct FailingAppends {
        inner: MemoryStore,
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl TableStore for FailingAppends {
        async fn list_tables(&self) -> StoreResult<Vec<TableInfo>> {
            self.inner.list_tables().await
        }
        async fn get_header(&self, table: &str) -> StoreResult<Vec<String>> {
            self.calls.lock().unwrap().push("get_header");
            self.inner.get_header(table).await
        }
        async fn delete_header_row(&self, table: &str) -> StoreResult<()> {
            self.calls.lock().unwrap().push("delete_header_row");
            self.inner.delete_header_row(table).await
        }
        async fn insert_row(&self, table: &str, position: u32, values: &[String]) -> StoreResult<()> {
            self.calls.lock().unwrap().push("insert_row");
            self.inner.insert_row(table, position, values).await
        }
        async fn update_row(&self, table: &str, position: u32, values: &[String]) -> StoreResult<()> {
            self.calls.lock().unwrap().push("update_row");
            self.inner.update_row(table, position, values).await
        }
        async fn append_row(&self, _table: &str, _values: &[String]) -> StoreResult<()> {
            self.calls.lock().unwrap().push("append_row");
            Err(StoreError::Api {
                status: 503,
                message: "quota exceeded".into(),
            })
        }
        async fn get_all_values(&self, table: &str) -> StoreResult<Vec<Vec<String>>> {
            self.inner.get_all_values(table).await
        }
        async fn get_range(&self, table: &str, range: &str) -> StoreResult<Vec<Vec<String>>> {
            self.inner.get_range(table, range).await
        }
        async fn clear(&self, table: &str) -> StoreResult<()> {
            self.inner.clear(table).await
        }
        async fn create_table(&self, name: &str, rows: u32, columns: u32) -> StoreResult<()> {
            self.inner.create_table(name, rows, columns).await
        }
        async fn delete_table(&self, table: &str) -> StoreResult<()> {
            self.inner.delete_table(table).await
        }
        async fn rename_table(&self, table: &str, new_name: &str) -> StoreResult<()> {
            self.inner.rename_table(table, new_name).await
        }
    }

    #[tokio::test]
    async fn store_fault_is_write_failure_without_retry() {
        let store = Arc::new(FailingAppends {
            inner: MemoryStore::new().with_table("T", vec![strings(&["a"])]),
            calls: Mutex::new(Vec::new()),
        });
        let gw = SheetGateway::new(store.clone());
        let err = gw
            .append_record("T", &record(json!({"a": 1, "b": 2})))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::WriteFailure(_)));
        assert_eq!(
            *store.calls.lock().unwrap(),
            vec!["get_header", "delete_header_row", "insert_row", "append_row"]
        );
    }
}
