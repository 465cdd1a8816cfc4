// src/gateway/evolution.rs

//! Header reconciliation and row shaping. Everything here is pure: the
//! gateway reads from the store, calls into this module, then writes back.

use serde_json::{Map, Value};
use std::collections::HashSet;

/// Result of fitting one record to a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// The header after growth (`old ++ added`).
    pub header: Vec<String>,
    /// Fields that were not in the old header, in record order.
    pub added: Vec<String>,
    /// One cell per header column.
    pub row: Vec<String>,
}

impl Reconciled {
    pub fn header_changed(&self) -> bool {
        !self.added.is_empty()
    }
}

/// Extend `header` with the record's unseen fields and lay the record out
/// along the result. Existing columns keep their order; absent fields are `""`.
pub fn reconcile(header: &[String], record: &Map<String, Value>) -> Reconciled {
    let known: HashSet<&str> = header.iter().map(String::as_str).collect();
    let added: Vec<String> = record
        .keys()
        .filter(|k| !known.contains(k.as_str()))
        .cloned()
        .collect();

    let mut header = header.to_vec();
    header.extend(added.iter().cloned());

    let row = header
        .iter()
        .map(|column| record.get(column).map(coerce_cell).unwrap_or_default())
        .collect();

    Reconciled { header, added, row }
}

/// The string stored for a JSON value.
pub fn coerce_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // arrays and objects are kept as compact JSON text
        other => other.to_string(),
    }
}

/// Drop every column named in `remove` from the header and from each row.
/// Cells past the header's width are kept.
pub fn drop_columns(
    header: &[String],
    rows: &[Vec<String>],
    remove: &[String],
) -> (Vec<String>, Vec<Vec<String>>) {
    let remove: HashSet<&str> = remove.iter().map(String::as_str).collect();
    let keep: Vec<bool> = header.iter().map(|h| !remove.contains(h.as_str())).collect();

    let new_header = header
        .iter()
        .zip(&keep)
        .filter(|(_, k)| **k)
        .map(|(h, _)| h.clone())
        .collect();

    let new_rows = rows
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .filter(|(i, _)| keep.get(*i).copied().unwrap_or(true))
                .map(|(_, cell)| cell.clone())
                .collect()
        })
        .collect();

    (new_header, new_rows)
}

/// Pair a data row with the header; short rows read as `""`.
pub fn zip_record(header: &[String], row: &[String]) -> Map<String, Value> {
    header
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let cell = row.get(i).cloned().unwrap_or_default();
            (h.clone(), Value::String(cell))
        })
        .collect()
}

/// Does `record` match `needle`? With a key column, only that field is
/// compared; otherwise any field may match. Comparison ignores case.
pub fn record_matches(record: &Map<String, Value>, needle: &str, key_column: Option<&str>) -> bool {
    let needle = needle.to_lowercase();
    let eq = |v: &Value| coerce_cell(v).to_lowercase() == needle;
    match key_column {
        Some(column) => record.get(column).map_or(false, eq),
        None => record.values().any(eq),
    }
}

/// Header as read from a padded grid: trailing blank cells are not columns.
pub fn trim_header(header: &[String]) -> Vec<String> {
    let end = header
        .iter()
        .rposition(|h| !h.is_empty())
        .map_or(0, |i| i + 1);
    header[..end].to_vec()
}

/// First duplicated name in `header`, if any.
pub fn first_duplicate(header: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    header.iter().map(String::as_str).find(|h| !seen.insert(*h))
}
