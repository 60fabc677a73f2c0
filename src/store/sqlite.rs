//! SQLite table-store backend
//!
//! Local stand-in for the remote table service, with the same seam: generic
//! tables of JSON rows with store-assigned integer ids. One database file,
//! one `records` table, rows discriminated by table name. Thread-safe via an
//! internal mutex on the connection.

use super::traits::{matches, Filter, Row, StoreError, StoreResult, TableStore};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed table store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                table_name TEXT NOT NULL,
                id INTEGER NOT NULL,
                data_json TEXT NOT NULL,
                PRIMARY KEY (table_name, id)
            );

            CREATE INDEX IF NOT EXISTS idx_records_table
                ON records(table_name);

            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn next_id(conn: &Connection, table: &str) -> StoreResult<i64> {
        let max: Option<i64> = conn.query_row(
            "SELECT MAX(id) FROM records WHERE table_name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0) + 1)
    }
}

#[async_trait]
impl TableStore for SqliteStore {
    async fn select(&self, table: &str, filters: &[Filter]) -> StoreResult<Vec<Row>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT data_json FROM records WHERE table_name = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![table], |row| row.get::<_, String>(0))?;

        let mut result = Vec::new();
        for data_json in rows {
            let row: Row = serde_json::from_str(&data_json?)?;
            if matches(&row, filters) {
                result.push(row);
            }
        }
        Ok(result)
    }

    async fn insert(&self, table: &str, records: &[Value]) -> StoreResult<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let mut id = Self::next_id(&tx, table)?;
        for record in records {
            let mut row = match record {
                Value::Object(map) => map.clone(),
                other => return Err(StoreError::NotAnObject(other.to_string())),
            };
            row.entry("id".to_string()).or_insert(Value::from(id));
            tx.execute(
                "INSERT INTO records (table_name, id, data_json) VALUES (?1, ?2, ?3)",
                params![table, id, serde_json::to_string(&row)?],
            )?;
            id += 1;
        }

        tx.commit()?;
        Ok(records.len())
    }
}
