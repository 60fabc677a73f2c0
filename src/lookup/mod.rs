//! Natural-key → surrogate-id lookup caches
//!
//! Surrogate ids are assigned by the store; raw rows only carry business
//! identifiers (names, codes). Each stage builds its caches with one scoped
//! fetch per entity kind, then resolves every row against them. A cache is
//! read-only once built and is rebuilt per stage invocation — records
//! created earlier in the same run are visible only after the upload step
//! between stages, which is why stages are strictly ordered.

use crate::normalize::code::pad_code;
use crate::store::{Filter, Row, StoreError, TableStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Building a cache failed — the stage has no foreign-key universe and
/// cannot proceed. Always fatal.
#[derive(Debug, Error)]
pub enum FatalLookupError {
    #[error("no {entity} rows in store{scope}; the upstream stage has not been uploaded")]
    Empty { entity: &'static str, scope: String },

    #[error("store error while building {entity} lookup: {source}")]
    Store {
        entity: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("{entity} row {hint} has no usable '{column}' value")]
    MalformedRow {
        entity: &'static str,
        column: &'static str,
        hint: String,
    },
}

/// Which natural key identifies a neighbourhood in a given source vintage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NeighbourhoodKey {
    /// Neighbourhood code alone (unique city-wide in newer vintages)
    Code,
    /// `(district, neighbourhood code)` pair
    DistrictAndCode,
}

/// A natural key as indexed by a cache
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKey {
    Name(String),
    Code(String),
    DistrictCode { district_id: i64, code: String },
}

impl NaturalKey {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn code(code: impl Into<String>) -> Self {
        Self::Code(code.into())
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => write!(f, "'{}'", name),
            Self::Code(code) => write!(f, "code {}", code),
            Self::DistrictCode { district_id, code } => {
                write!(f, "district {} / code {}", district_id, code)
            }
        }
    }
}

/// Read-only natural-key → surrogate-id map for one entity kind
#[derive(Debug)]
pub struct LookupCache {
    entity: &'static str,
    entries: HashMap<NaturalKey, i64>,
}

impl LookupCache {
    /// Pure lookup, never mutates
    pub fn get(&self, key: &NaturalKey) -> Option<i64> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// Districts of one city, keyed by name
    pub async fn districts_by_name(
        store: &dyn TableStore,
        city_id: i64,
    ) -> Result<Self, FatalLookupError> {
        let rows = fetch("districts", store, &[Filter::eq("city_id", city_id)], city_id).await?;
        let mut entries = HashMap::new();
        for row in &rows {
            let id = row_id("districts", row)?;
            let name = string_column("districts", row, "name")?;
            entries.insert(NaturalKey::Name(name), id);
        }
        Ok(Self {
            entity: "districts",
            entries,
        })
    }

    /// Districts of one city, keyed by canonical code
    pub async fn districts_by_code(
        store: &dyn TableStore,
        city_id: i64,
    ) -> Result<Self, FatalLookupError> {
        let rows = fetch("districts", store, &[Filter::eq("city_id", city_id)], city_id).await?;
        let mut entries = HashMap::new();
        for row in &rows {
            let id = row_id("districts", row)?;
            let code = code_column("districts", row, "code")?;
            entries.insert(NaturalKey::Code(code), id);
        }
        Ok(Self {
            entity: "districts",
            entries,
        })
    }

    /// Neighbourhoods of one city, indexed by the requested key shape
    pub async fn neighbourhoods(
        store: &dyn TableStore,
        city_id: i64,
        key: NeighbourhoodKey,
    ) -> Result<Self, FatalLookupError> {
        let entity = "neighbourhoods";
        let rows = fetch(entity, store, &[Filter::eq("city_id", city_id)], city_id).await?;
        let mut entries = HashMap::new();
        for row in &rows {
            let id = row_id(entity, row)?;
            let code = code_column(entity, row, "code")?;
            let natural = match key {
                NeighbourhoodKey::Code => NaturalKey::Code(code),
                NeighbourhoodKey::DistrictAndCode => {
                    let district_id = integer_column(entity, row, "district_id")?;
                    NaturalKey::DistrictCode { district_id, code }
                }
            };
            entries.insert(natural, id);
        }
        Ok(Self { entity, entries })
    }

    /// All feature types, keyed by canonical category label
    pub async fn feature_types(store: &dyn TableStore) -> Result<Self, FatalLookupError> {
        Self::by_name(store, "feature types", "feature_types").await
    }

    /// All indicator definitions, keyed by name
    pub async fn indicator_definitions(store: &dyn TableStore) -> Result<Self, FatalLookupError> {
        Self::by_name(store, "indicator definitions", "indicator_definitions").await
    }

    async fn by_name(
        store: &dyn TableStore,
        entity: &'static str,
        table: &str,
    ) -> Result<Self, FatalLookupError> {
        let rows = store
            .select(table, &[])
            .await
            .map_err(|source| FatalLookupError::Store { entity, source })?;
        if rows.is_empty() {
            return Err(FatalLookupError::Empty {
                entity,
                scope: String::new(),
            });
        }
        let mut entries = HashMap::new();
        for row in &rows {
            let id = row_id(entity, row)?;
            let name = string_column(entity, row, "name")?;
            entries.insert(NaturalKey::Name(name), id);
        }
        Ok(Self { entity, entries })
    }
}

async fn fetch(
    entity: &'static str,
    store: &dyn TableStore,
    filters: &[Filter],
    city_id: i64,
) -> Result<Vec<Row>, FatalLookupError> {
    let rows = store
        .select(entity, filters)
        .await
        .map_err(|source| FatalLookupError::Store { entity, source })?;
    if rows.is_empty() {
        return Err(FatalLookupError::Empty {
            entity,
            scope: format!(" for city_id {}", city_id),
        });
    }
    Ok(rows)
}

fn row_hint(row: &Row) -> String {
    row.get("name")
        .or_else(|| row.get("id"))
        .map(|v| v.to_string())
        .unwrap_or_else(|| "<unidentified>".to_string())
}

fn row_id(entity: &'static str, row: &Row) -> Result<i64, FatalLookupError> {
    row.get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| FatalLookupError::MalformedRow {
            entity,
            column: "id",
            hint: row_hint(row),
        })
}

fn integer_column(
    entity: &'static str,
    row: &Row,
    column: &'static str,
) -> Result<i64, FatalLookupError> {
    row.get(column)
        .and_then(Value::as_i64)
        .ok_or_else(|| FatalLookupError::MalformedRow {
            entity,
            column,
            hint: row_hint(row),
        })
}

fn string_column(
    entity: &'static str,
    row: &Row,
    column: &'static str,
) -> Result<String, FatalLookupError> {
    row.get(column)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FatalLookupError::MalformedRow {
            entity,
            column,
            hint: row_hint(row),
        })
}

/// Read a code column, canonicalizing so integer and string source codes
/// unify on the padded form.
fn code_column(
    entity: &'static str,
    row: &Row,
    column: &'static str,
) -> Result<String, FatalLookupError> {
    let raw = match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(FatalLookupError::MalformedRow {
                entity,
                column,
                hint: row_hint(row),
            })
        }
    };
    pad_code(&raw).map_err(|_| FatalLookupError::MalformedRow {
        entity,
        column,
        hint: row_hint(row),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn empty_store_is_fatal() {
        let store = MemoryStore::new();
        let err = LookupCache::districts_by_name(&store, 1).await.unwrap_err();
        assert!(matches!(err, FatalLookupError::Empty { entity: "districts", .. }));
    }

    #[tokio::test]
    async fn scope_filter_restricts_to_city() {
        let store = MemoryStore::new();
        store
            .insert(
                "districts",
                &[
                    json!({"name": "Eixample", "code": "02", "city_id": 1}),
                    json!({"name": "Retiro", "code": "03", "city_id": 2}),
                ],
            )
            .await
            .unwrap();

        let cache = LookupCache::districts_by_name(&store, 1).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&NaturalKey::name("Eixample")), Some(1));
        assert_eq!(cache.get(&NaturalKey::name("Retiro")), None);
    }

    #[tokio::test]
    async fn integer_codes_unify_with_padded_strings() {
        let store = MemoryStore::new();
        store
            .insert(
                "districts",
                &[
                    json!({"name": "Ciutat Vella", "code": 1, "city_id": 1}),
                    json!({"name": "Eixample", "code": "02", "city_id": 1}),
                ],
            )
            .await
            .unwrap();

        let cache = LookupCache::districts_by_code(&store, 1).await.unwrap();
        assert_eq!(cache.get(&NaturalKey::code("01")), Some(1));
        assert_eq!(cache.get(&NaturalKey::code("02")), Some(2));
    }

    #[tokio::test]
    async fn neighbourhood_pair_key_includes_district() {
        let store = MemoryStore::new();
        store
            .insert(
                "neighbourhoods",
                &[
                    json!({"name": "el Raval", "code": "01", "district_id": 1, "city_id": 1}),
                    json!({"name": "la Sagrada Família", "code": "06", "district_id": 2, "city_id": 1}),
                ],
            )
            .await
            .unwrap();

        let cache = LookupCache::neighbourhoods(&store, 1, NeighbourhoodKey::DistrictAndCode)
            .await
            .unwrap();
        assert_eq!(
            cache.get(&NaturalKey::DistrictCode {
                district_id: 2,
                code: "06".to_string()
            }),
            Some(2)
        );
        assert_eq!(cache.get(&NaturalKey::code("06")), None);
    }

    #[tokio::test]
    async fn malformed_store_row_is_fatal() {
        let store = MemoryStore::new();
        store
            .insert("districts", &[json!({"name": "Eixample", "city_id": 1})])
            .await
            .unwrap();

        let err = LookupCache::districts_by_code(&store, 1).await.unwrap_err();
        assert!(matches!(
            err,
            FatalLookupError::MalformedRow { column: "code", .. }
        ));
    }
}
