//! Staged output files
//!
//! One pretty-printed UTF-8 JSON array per entity type per city. These files
//! are the boundary artifact consumers and tests rely on: re-running a stage
//! on identical raw input must reproduce them byte for byte, which is why
//! record field order is fixed and property bags are ordered maps.

use super::runner::StageError;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Path of the staged file for one entity type and city
pub fn staged_path(dir: &Path, entity: &str, city: &str) -> PathBuf {
    dir.join(format!("insert_ready_{}_{}.json", entity, city))
}

/// Write records as a staged JSON file, creating the directory as needed.
pub fn write_staged<T: Serialize>(
    dir: &Path,
    entity: &str,
    city: &str,
    records: &[T],
) -> Result<PathBuf, StageError> {
    let path = staged_path(dir, entity, city);
    let staging_error = |detail: String| StageError::Staging {
        path: path.clone(),
        detail,
    };

    std::fs::create_dir_all(dir).map_err(|e| staging_error(e.to_string()))?;
    let json = serde_json::to_string_pretty(records).map_err(|e| staging_error(e.to_string()))?;
    std::fs::write(&path, json).map_err(|e| staging_error(e.to_string()))?;
    Ok(path)
}

/// Read a staged file back as raw records.
pub fn read_staged(path: &Path) -> Result<Vec<Value>, StageError> {
    let staging_error = |detail: String| StageError::Staging {
        path: path.to_path_buf(),
        detail,
    };
    let text = std::fs::read_to_string(path).map_err(|e| staging_error(e.to_string()))?;
    let value: Value = serde_json::from_str(&text).map_err(|e| staging_error(e.to_string()))?;
    match value {
        Value::Array(records) => Ok(records),
        _ => Err(staging_error("expected a JSON array".to_string())),
    }
}
