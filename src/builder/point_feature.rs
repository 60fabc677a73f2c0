//! Point-feature builder

use super::records::PointFeatureRecord;
use super::types::{BuildError, RawRow};
use crate::geometry::codec;
use crate::lookup::{LookupCache, NaturalKey};
use crate::normalize::code::pad_code;
use crate::normalize::config::PointFeatureSource;
use std::collections::BTreeMap;

/// Builds point-feature records from a POI catalog.
///
/// Resolution chain: district code → district id (district cache), then
/// `(district id, neighbourhood code)` → geo id (neighbourhood cache);
/// free-text category → canonical label (static table) → feature type id
/// (feature-type cache). Source columns the builder does not consume and
/// the config does not exclude pass through verbatim into `properties`, so
/// new source columns propagate without code changes.
pub struct PointFeatureBuilder<'a> {
    cfg: &'a PointFeatureSource,
    geo_level_id: i64,
    districts: &'a LookupCache,
    neighbourhoods: &'a LookupCache,
    feature_types: &'a LookupCache,
}

impl<'a> PointFeatureBuilder<'a> {
    pub fn new(
        cfg: &'a PointFeatureSource,
        geo_level_id: i64,
        districts: &'a LookupCache,
        neighbourhoods: &'a LookupCache,
        feature_types: &'a LookupCache,
    ) -> Self {
        Self {
            cfg,
            geo_level_id,
            districts,
            neighbourhoods,
            feature_types,
        }
    }

    pub fn build(&self, row: &RawRow) -> Result<PointFeatureRecord, BuildError> {
        let district_code = pad_code(&row.text(&self.cfg.district_code_column)?)?;
        let neighbourhood_code = pad_code(&row.text(&self.cfg.neighbourhood_code_column)?)?;

        let district_id = self
            .districts
            .get(&NaturalKey::Code(district_code.clone()))
            .ok_or_else(|| BuildError::LookupMiss {
                entity: "district",
                key: format!("code {}", district_code),
            })?;
        let geo_id = self
            .neighbourhoods
            .get(&NaturalKey::DistrictCode {
                district_id,
                code: neighbourhood_code.clone(),
            })
            .ok_or_else(|| BuildError::LookupMiss {
                entity: "neighbourhood",
                key: format!("{}-{}", district_code, neighbourhood_code),
            })?;

        let category = row.text(&self.cfg.category_column)?;
        let label = self.cfg.category_map.resolve(category.trim())?;
        let feature_type_id = self
            .feature_types
            .get(&NaturalKey::name(label))
            .ok_or_else(|| BuildError::LookupMiss {
                entity: "feature type",
                key: format!("'{}'", label),
            })?;

        let latitude = row.number(&self.cfg.latitude_column)?;
        let longitude = row.number(&self.cfg.longitude_column)?;
        let geometry = codec::point(longitude, latitude);

        let name = row.text(&self.cfg.name_column)?.trim().to_string();

        Ok(PointFeatureRecord {
            feature_type_id,
            name,
            latitude,
            longitude,
            geom: codec::serialize(&geometry),
            geo_level_id: self.geo_level_id,
            geo_id,
            properties: self.properties(row),
        })
    }

    /// Pass-through bag: everything not consumed above and not excluded
    /// by configuration.
    fn properties(&self, row: &RawRow) -> BTreeMap<String, serde_json::Value> {
        let consumed = [
            self.cfg.name_column.as_str(),
            self.cfg.category_column.as_str(),
            self.cfg.latitude_column.as_str(),
            self.cfg.longitude_column.as_str(),
            self.cfg.district_code_column.as_str(),
            self.cfg.neighbourhood_code_column.as_str(),
        ];
        row.columns()
            .filter(|(column, _)| {
                !consumed.contains(&column.as_str())
                    && !self
                        .cfg
                        .excluded_properties
                        .iter()
                        .any(|excluded| excluded == *column)
            })
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect()
    }

    pub fn identifier(&self, row: &RawRow) -> String {
        row.identifier(&self.cfg.name_column)
    }
}
