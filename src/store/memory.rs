//! In-memory table store for tests and dry runs

use super::traits::{matches, Filter, Row, StoreError, StoreResult, TableStore};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Table store held entirely in memory.
///
/// Surrogate ids are assigned per table, starting at 1, in insertion order.
/// Selecting from a table that was never written returns no rows — exactly
/// the condition the lookup layer treats as fatal.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows currently held in `table`
    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn select(&self, table: &str, filters: &[Filter]) -> StoreResult<Vec<Row>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches(row, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, table: &str, records: &[Value]) -> StoreResult<usize> {
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();

        for record in records {
            let mut row = match record {
                Value::Object(map) => map.clone(),
                other => return Err(StoreError::NotAnObject(other.to_string())),
            };
            let id = rows.len() as i64 + 1;
            row.entry("id".to_string()).or_insert(Value::from(id));
            rows.push(row);
        }

        Ok(records.len())
    }
}
