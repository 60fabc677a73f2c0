//! Raw row access and row-scoped build errors

use crate::geometry::GeometryError;
use crate::normalize::code::{CodeFormatError, UnknownNameError};
use crate::store::Row;
use serde_json::Value;
use thiserror::Error;

/// Why a single raw row produced no record.
///
/// Everything here is row-scoped and non-fatal: the stage records it and
/// moves on.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    CodeFormat(#[from] CodeFormatError),

    #[error(transparent)]
    UnknownName(#[from] UnknownNameError),

    #[error("no {entity} found for {key}")]
    LookupMiss { entity: &'static str, key: String },

    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("column '{column}': {detail}")]
    Value { column: String, detail: String },

    #[error("incomplete coverage for {unit}: {have} of {expected} expected entries")]
    Incomplete {
        unit: String,
        have: usize,
        expected: usize,
    },
}

/// A failed row, paired with the identifier error summaries are keyed by
#[derive(Debug)]
pub struct RowFailure {
    pub identifier: String,
    pub error: BuildError,
}

impl RowFailure {
    pub fn new(identifier: impl Into<String>, error: BuildError) -> Self {
        Self {
            identifier: identifier.into(),
            error,
        }
    }
}

/// One raw source row: a flat column → value map.
///
/// JSON sources keep their native value types; CSV sources carry every field
/// as a string. The accessors coerce between the two so builders don't care
/// which format a row came from.
#[derive(Debug, Clone)]
pub struct RawRow(Row);

impl RawRow {
    pub fn new(row: Row) -> Self {
        Self(row)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Read a column as text. Numbers are rendered; anything else fails.
    pub fn text(&self, column: &str) -> Result<String, BuildError> {
        match self.get(column) {
            None | Some(Value::Null) => Err(BuildError::MissingColumn(column.to_string())),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(other) => Err(BuildError::Value {
                column: column.to_string(),
                detail: format!("expected text, got {}", other),
            }),
        }
    }

    /// Read a column as a number, accepting numeric strings.
    pub fn number(&self, column: &str) -> Result<f64, BuildError> {
        match self.get(column) {
            None | Some(Value::Null) => Err(BuildError::MissingColumn(column.to_string())),
            Some(Value::Number(n)) => n.as_f64().ok_or_else(|| BuildError::Value {
                column: column.to_string(),
                detail: format!("not representable as f64: {}", n),
            }),
            Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| BuildError::Value {
                column: column.to_string(),
                detail: format!("not a number: '{}'", s),
            }),
            Some(other) => Err(BuildError::Value {
                column: column.to_string(),
                detail: format!("expected number, got {}", other),
            }),
        }
    }

    /// Best-effort row identifier for error reporting. Never fails.
    pub fn identifier(&self, column: &str) -> String {
        match self.get(column) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "unknown".to_string(),
        }
    }
}

impl From<Row> for RawRow {
    fn from(row: Row) -> Self {
        Self(row)
    }
}
