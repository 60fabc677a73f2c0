//! Store trait definitions

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// One store row: column name → value
pub type Row = serde_json::Map<String, Value>;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("record is not an object: {0}")]
    NotAnObject(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// An equality predicate on a column
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Whether a row satisfies every filter
pub(crate) fn matches(row: &Row, filters: &[Filter]) -> bool {
    filters
        .iter()
        .all(|f| row.get(&f.column) == Some(&f.value))
}

/// Trait for table-store backends
///
/// Implementations must be thread-safe (Send + Sync). `select` is used only
/// to build lookup caches; `insert` is the bulk-upload seam, called once per
/// entity type per city batch and never with an empty batch.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Fetch all rows of `table` matching every filter
    async fn select(&self, table: &str, filters: &[Filter]) -> StoreResult<Vec<Row>>;

    /// Bulk-insert records into `table`, returning the inserted row count.
    /// Each record must be a JSON object; the store assigns surrogate ids.
    async fn insert(&self, table: &str, records: &[Value]) -> StoreResult<usize>;
}
