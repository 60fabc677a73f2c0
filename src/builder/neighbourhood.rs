//! Neighbourhood builder

use super::records::NeighbourhoodRecord;
use super::types::{BuildError, RawRow};
use crate::geometry::codec;
use crate::lookup::{LookupCache, NaturalKey};
use crate::normalize::code::pad_code;
use crate::normalize::config::{DistrictKeyKind, NeighbourhoodSource};

/// Builds neighbourhood records, resolving each row's district against the
/// district cache. A miss skips the row — it never invents a default.
pub struct NeighbourhoodBuilder<'a> {
    cfg: &'a NeighbourhoodSource,
    city_id: i64,
    districts: &'a LookupCache,
}

impl<'a> NeighbourhoodBuilder<'a> {
    pub fn new(cfg: &'a NeighbourhoodSource, city_id: i64, districts: &'a LookupCache) -> Self {
        Self {
            cfg,
            city_id,
            districts,
        }
    }

    pub fn build(&self, row: &RawRow) -> Result<NeighbourhoodRecord, BuildError> {
        let name = row.text(&self.cfg.name_column)?.trim().to_string();
        let code = pad_code(&row.text(&self.cfg.code_column)?)?;

        let raw_ref = row.text(&self.cfg.district_ref.column)?;
        let key = match self.cfg.district_ref.key {
            DistrictKeyKind::Name => {
                let canonical = self.cfg.district_aliases.canonicalize(raw_ref.trim());
                NaturalKey::name(canonical)
            }
            DistrictKeyKind::Code => NaturalKey::Code(pad_code(&raw_ref)?),
        };
        let district_id = self
            .districts
            .get(&key)
            .ok_or_else(|| BuildError::LookupMiss {
                entity: "district",
                key: key.to_string(),
            })?;

        let geometry = codec::parse(&row.text(&self.cfg.geometry_column)?)?;

        Ok(NeighbourhoodRecord {
            name,
            code,
            district_id,
            city_id: self.city_id,
            geom: codec::serialize(&geometry),
        })
    }

    pub fn identifier(&self, row: &RawRow) -> String {
        row.identifier(&self.cfg.name_column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, TableStore};
    use serde_json::json;

    fn source(key: &str) -> NeighbourhoodSource {
        serde_yaml::from_str(&format!(
            r#"
path: neighbourhoods.json
name_column: nom_barri
code_column: codi_barri
geometry_column: geometria_wgs84
district_ref:
  column: nom_districte
  key: {key}
district_aliases:
  Sarria-Sant Gervasi: Sarrià-Sant Gervasi
"#
        ))
        .unwrap()
    }

    fn raw(value: serde_json::Value) -> RawRow {
        match value {
            serde_json::Value::Object(map) => RawRow::new(map),
            _ => panic!("fixture must be an object"),
        }
    }

    async fn district_cache() -> LookupCache {
        let store = MemoryStore::new();
        store
            .insert(
                "districts",
                &[
                    json!({"name": "Eixample", "code": "02", "city_id": 1}),
                    json!({"name": "Sarrià-Sant Gervasi", "code": "05", "city_id": 1}),
                ],
            )
            .await
            .unwrap();
        LookupCache::districts_by_name(&store, 1).await.unwrap()
    }

    #[tokio::test]
    async fn resolves_district_by_name() {
        let cfg = source("name");
        let districts = district_cache().await;
        let builder = NeighbourhoodBuilder::new(&cfg, 1, &districts);

        let record = builder
            .build(&raw(json!({
                "nom_barri": "la Sagrada Família",
                "codi_barri": "6",
                "nom_districte": "Eixample",
                "geometria_wgs84": "POLYGON ((2.17 41.40, 2.19 41.40, 2.18 41.41, 2.17 41.40))"
            })))
            .unwrap();

        assert_eq!(record.code, "06");
        assert_eq!(record.district_id, 1);
        assert_eq!(record.city_id, 1);
        assert!(record.geom.starts_with("SRID=4326;POLYGON"));
    }

    #[tokio::test]
    async fn alias_table_bridges_name_variants() {
        let cfg = source("name");
        let districts = district_cache().await;
        let builder = NeighbourhoodBuilder::new(&cfg, 1, &districts);

        let record = builder
            .build(&raw(json!({
                "nom_barri": "Sarrià",
                "codi_barri": "23",
                "nom_districte": "Sarria-Sant Gervasi",
                "geometria_wgs84": "POINT (2.12 41.40)"
            })))
            .unwrap();
        assert_eq!(record.district_id, 2);
    }

    #[tokio::test]
    async fn unresolved_district_skips_the_row() {
        let cfg = source("name");
        let districts = district_cache().await;
        let builder = NeighbourhoodBuilder::new(&cfg, 1, &districts);

        let err = builder
            .build(&raw(json!({
                "nom_barri": "el Besòs",
                "codi_barri": "70",
                "nom_districte": "Sant Martí",
                "geometria_wgs84": "POINT (2.21 41.42)"
            })))
            .unwrap_err();

        assert!(matches!(
            err,
            BuildError::LookupMiss { entity: "district", .. }
        ));
    }
}
