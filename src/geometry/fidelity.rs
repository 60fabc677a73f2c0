//! Geometry fidelity validation
//!
//! A regression guard against codec drift: re-parses raw and staged entries
//! and asserts coordinate-wise equality within a fixed tolerance. Checks a
//! sample (the first record, or an explicit set of indices), not the full
//! batch.

use super::codec::{self, GeometryError};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default comparison tolerance, in degrees
pub const DEFAULT_TOLERANCE: f64 = 1e-5;

/// Errors raised by fidelity validation
#[derive(Debug, Error)]
pub enum FidelityError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("failed to read {path}: {detail}")]
    Read { path: PathBuf, detail: String },

    #[error("{path} is not a JSON array of records")]
    NotAnArray { path: PathBuf },

    #[error("record {index} has no '{column}' field")]
    MissingColumn { index: usize, column: String },

    #[error("record index {index} out of range ({len} records)")]
    OutOfRange { index: usize, len: usize },
}

/// Result of a fidelity pass: which indices were checked, which drifted.
#[derive(Debug, Clone)]
pub struct FidelityReport {
    pub checked: Vec<usize>,
    pub mismatches: Vec<usize>,
}

impl FidelityReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Compares staged geometry against its raw source within a tolerance.
#[derive(Debug, Clone, Copy)]
pub struct FidelityValidator {
    tolerance: f64,
}

impl Default for FidelityValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl FidelityValidator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Check one raw/staged geometry pair. The SRID tag is stripped from
    /// either side before comparison.
    pub fn check(&self, raw: &str, staged: &str) -> Result<bool, GeometryError> {
        let raw = codec::parse(raw)?;
        let staged = codec::parse(staged)?;
        Ok(codec::equals_within_tolerance(&raw, &staged, self.tolerance))
    }

    /// Check raw source records against a staged file.
    ///
    /// `raw_column` names the geometry field in the raw records; staged
    /// records carry theirs in `geom`. With no explicit `indices`, only the
    /// first record is checked.
    pub fn validate_files(
        &self,
        raw_path: &Path,
        raw_column: &str,
        staged_path: &Path,
        indices: &[usize],
    ) -> Result<FidelityReport, FidelityError> {
        let raw = read_array(raw_path)?;
        let staged = read_array(staged_path)?;

        let checked: Vec<usize> = if indices.is_empty() {
            vec![0]
        } else {
            indices.to_vec()
        };

        let mut mismatches = Vec::new();
        for &index in &checked {
            let raw_geom = geometry_field(&raw, index, raw_column)?;
            let staged_geom = geometry_field(&staged, index, "geom")?;
            if !self.check(raw_geom, staged_geom)? {
                mismatches.push(index);
            }
        }

        Ok(FidelityReport { checked, mismatches })
    }
}

fn read_array(path: &Path) -> Result<Vec<Value>, FidelityError> {
    let text = std::fs::read_to_string(path).map_err(|e| FidelityError::Read {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|e| FidelityError::Read {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    match value {
        Value::Array(records) => Ok(records),
        _ => Err(FidelityError::NotAnArray {
            path: path.to_path_buf(),
        }),
    }
}

fn geometry_field<'a>(
    records: &'a [Value],
    index: usize,
    column: &str,
) -> Result<&'a str, FidelityError> {
    let record = records.get(index).ok_or(FidelityError::OutOfRange {
        index,
        len: records.len(),
    })?;
    record
        .get(column)
        .and_then(Value::as_str)
        .ok_or_else(|| FidelityError::MissingColumn {
            index,
            column: column.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const POLYGON: &str = "POLYGON ((2.15899 41.38879, 2.17056 41.38712, 2.16963 41.39499, 2.15899 41.38879))";

    #[test]
    fn identity_transform_passes() {
        let validator = FidelityValidator::default();
        let staged = format!("SRID=4326;{}", POLYGON);
        assert!(validator.check(POLYGON, &staged).unwrap());
    }

    #[test]
    fn drift_beyond_tolerance_fails() {
        let validator = FidelityValidator::default();
        let drifted = "SRID=4326;POLYGON ((2.16 41.38879, 2.17056 41.38712, 2.16963 41.39499, 2.16 41.38879))";
        assert!(!validator.check(POLYGON, drifted).unwrap());
    }

    #[test]
    fn validates_first_record_of_files() {
        let dir = tempfile::tempdir().unwrap();
        let raw_path = dir.path().join("raw.json");
        let staged_path = dir.path().join("staged.json");

        fs::write(
            &raw_path,
            serde_json::to_string_pretty(&serde_json::json!([
                { "nom_districte": "Eixample", "geometria_wgs84": POLYGON }
            ]))
            .unwrap(),
        )
        .unwrap();
        fs::write(
            &staged_path,
            serde_json::to_string_pretty(&serde_json::json!([
                { "name": "Eixample", "geom": format!("SRID=4326;{}", POLYGON) }
            ]))
            .unwrap(),
        )
        .unwrap();

        let report = FidelityValidator::default()
            .validate_files(&raw_path, "geometria_wgs84", &staged_path, &[])
            .unwrap();
        assert_eq!(report.checked, vec![0]);
        assert!(report.is_clean());
    }

    #[test]
    fn out_of_range_index_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let raw_path = dir.path().join("raw.json");
        let staged_path = dir.path().join("staged.json");
        fs::write(&raw_path, "[]").unwrap();
        fs::write(&staged_path, "[]").unwrap();

        let err = FidelityValidator::default()
            .validate_files(&raw_path, "geom", &staged_path, &[3])
            .unwrap_err();
        assert!(matches!(err, FidelityError::OutOfRange { index: 3, .. }));
    }
}
