//! Raw source extraction
//!
//! Sources arrive as JSON arrays of objects (boundary exports) or as
//! delimited CSV (catalogs, indicator panels). Both land in the same flat
//! [`RawRow`] shape; CSV fields stay strings and the row accessors coerce.

use super::runner::StageError;
use crate::builder::RawRow;
use crate::normalize::config::{SourceFormat, TableSource};
use serde_json::Value;
use std::path::Path;

/// Read every row of a configured source file.
pub fn read_rows(source: &TableSource) -> Result<Vec<RawRow>, StageError> {
    match source.format {
        SourceFormat::Json => read_json(&source.path),
        SourceFormat::Csv => read_csv(&source.path, source.delimiter),
    }
}

fn source_error(path: &Path, detail: impl std::fmt::Display) -> StageError {
    StageError::Source {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

fn read_json(path: &Path) -> Result<Vec<RawRow>, StageError> {
    let text = std::fs::read_to_string(path).map_err(|e| source_error(path, e))?;
    let value: Value = serde_json::from_str(&text).map_err(|e| source_error(path, e))?;
    let records = match value {
        Value::Array(records) => records,
        _ => return Err(source_error(path, "expected a JSON array of records")),
    };

    let mut rows = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        match record {
            Value::Object(map) => rows.push(RawRow::new(map)),
            _ => {
                return Err(source_error(
                    path,
                    format!("record {} is not an object", index),
                ))
            }
        }
    }
    Ok(rows)
}

fn read_csv(path: &Path, delimiter: char) -> Result<Vec<RawRow>, StageError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| source_error(path, e))?;

    let headers = reader
        .headers()
        .map_err(|e| source_error(path, e))?
        .clone();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| source_error(path, e))?;
        let mut row = serde_json::Map::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            row.insert(header.to_string(), Value::String(field.to_string()));
        }
        rows.push(RawRow::new(row));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn table(path: &Path, format: SourceFormat, delimiter: char) -> TableSource {
        TableSource {
            path: path.to_path_buf(),
            format,
            delimiter,
        }
    }

    #[test]
    fn reads_json_array_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("districts.json");
        fs::write(
            &path,
            r#"[{"nom_districte": "Eixample", "Codi_Districte": "2"}]"#,
        )
        .unwrap();

        let rows = read_rows(&table(&path, SourceFormat::Json, ',')).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("nom_districte").unwrap(), "Eixample");
    }

    #[test]
    fn rejects_non_array_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"not": "an array"}"#).unwrap();

        assert!(matches!(
            read_rows(&table(&path, SourceFormat::Json, ',')),
            Err(StageError::Source { .. })
        ));
    }

    #[test]
    fn reads_semicolon_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("habitantes.csv");
        fs::write(
            &path,
            "cod_barrio;valor_indicador;ano\n11;146,8;2020\n12;153,1;2020\n",
        )
        .unwrap();

        let rows = read_rows(&table(&path, SourceFormat::Csv, ';')).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].text("valor_indicador").unwrap(), "153,1");
    }

    #[test]
    fn missing_file_is_a_source_error() {
        let err = read_rows(&table(
            Path::new("/nonexistent/source.json"),
            SourceFormat::Json,
            ',',
        ))
        .unwrap_err();
        assert!(matches!(err, StageError::Source { .. }));
    }
}
