//! Per-city source configuration
//!
//! Which raw column is authoritative for a code, whether a district
//! reference is a name or a code, which categories map to which canonical
//! labels — all of it varies by city and by data vintage. None of it belongs
//! in code. Each city ships a YAML file describing its sources; the pipeline
//! interprets it.
//!
//! ```yaml
//! city: barcelona
//! city_id: 1
//! districts:
//!   path: data/raw/bcn-districts.json
//!   name_column: nom_districte
//!   code_column: Codi_Districte
//!   geometry_column: geometria_wgs84
//! neighbourhoods:
//!   path: data/raw/bcn-neighbourhoods.json
//!   name_column: nom_barri
//!   code_column: codi_barri
//!   geometry_column: geometria_wgs84
//!   district_ref:
//!     column: nom_districte
//!     key: name
//! ```

use crate::lookup::NeighbourhoodKey;
use crate::normalize::code::NameTable;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {detail}")]
    Read { path: PathBuf, detail: String },

    #[error("failed to parse config {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// On-disk format of a tabular source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[default]
    Json,
    Csv,
}

/// A raw source file and how to read it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSource {
    pub path: PathBuf,
    #[serde(default)]
    pub format: SourceFormat,
    /// CSV field delimiter; ignored for JSON sources
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_delimiter() -> char {
    ','
}

/// Boundary file source for districts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundarySource {
    #[serde(flatten)]
    pub source: TableSource,
    pub name_column: String,
    pub code_column: String,
    pub geometry_column: String,
}

/// How a neighbourhood row references its district
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistrictRef {
    pub column: String,
    pub key: DistrictKeyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistrictKeyKind {
    Name,
    Code,
}

/// Boundary file source for neighbourhoods
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighbourhoodSource {
    #[serde(flatten)]
    pub source: TableSource,
    pub name_column: String,
    pub code_column: String,
    pub geometry_column: String,
    pub district_ref: DistrictRef,
    /// Locale variants of district names, mapped to their canonical form
    #[serde(default)]
    pub district_aliases: NameTable,
}

/// Point-of-interest catalog source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointFeatureSource {
    #[serde(flatten)]
    pub source: TableSource,
    pub name_column: String,
    pub category_column: String,
    pub latitude_column: String,
    pub longitude_column: String,
    pub district_code_column: String,
    pub neighbourhood_code_column: String,
    /// Free-text source categories mapped (many-to-one) to canonical labels
    pub category_map: NameTable,
    /// Source columns that must NOT pass through into `properties`.
    /// Columns the builder consumes are always excluded.
    #[serde(default)]
    pub excluded_properties: Vec<String>,
}

/// How duplicate indicator entries for the same unit collapse to one value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reduction {
    /// Average all entries per (unit, year) — income-style sources
    Mean,
    /// Keep the last entry per (unit, year) — multi-period sources
    LastWins,
}

/// One statistical indicator table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSource {
    #[serde(flatten)]
    pub source: TableSource,
    /// Name of the indicator definition in the store
    pub indicator: String,
    pub value_column: String,
    pub neighbourhood_code_column: String,
    /// Required when `neighbourhood_key` is `district-and-code`
    #[serde(default)]
    pub district_code_column: Option<String>,
    pub neighbourhood_key: NeighbourhoodKey,
    /// Fixed year for sources without a year column
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub year_column: Option<String>,
    /// Panel/period column for completeness validation, when present
    #[serde(default)]
    pub period_column: Option<String>,
    pub reduce: Reduction,
    /// Values use a comma decimal separator ("1.234,5")
    #[serde(default)]
    pub decimal_comma: bool,
}

/// The indicator stage: any number of sources, each mapped to one
/// indicator definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorStage {
    pub sources: Vec<IndicatorSource>,
}

fn default_geo_level_id() -> i64 {
    3 // neighbourhood level
}

/// Everything the pipeline needs to know about one city's sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityConfig {
    /// Slug used in staged file names (e.g. "bcn")
    pub city: String,
    pub city_id: i64,
    #[serde(default = "default_geo_level_id")]
    pub geo_level_id: i64,
    #[serde(default)]
    pub districts: Option<BoundarySource>,
    #[serde(default)]
    pub neighbourhoods: Option<NeighbourhoodSource>,
    #[serde(default)]
    pub point_features: Option<PointFeatureSource>,
    #[serde(default)]
    pub indicators: Option<IndicatorStage>,
}

impl CityConfig {
    /// Load a config file, resolving relative source paths against the
    /// config's own directory.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let mut config: Self = serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from YAML text without path resolution (tests, tools).
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(p.as_path());
            }
        };
        if let Some(s) = &mut self.districts {
            resolve(&mut s.source.path);
        }
        if let Some(s) = &mut self.neighbourhoods {
            resolve(&mut s.source.path);
        }
        if let Some(s) = &mut self.point_features {
            resolve(&mut s.source.path);
        }
        if let Some(stage) = &mut self.indicators {
            for s in &mut stage.sources {
                resolve(&mut s.source.path);
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(stage) = &self.indicators {
            for source in &stage.sources {
                if source.year.is_none() && source.year_column.is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "indicator source '{}' needs a fixed year or a year_column",
                        source.indicator
                    )));
                }
                if source.year.is_some() && source.year_column.is_some() {
                    return Err(ConfigError::Invalid(format!(
                        "indicator source '{}' sets both year and year_column",
                        source.indicator
                    )));
                }
                if source.neighbourhood_key == NeighbourhoodKey::DistrictAndCode
                    && source.district_code_column.is_none()
                {
                    return Err(ConfigError::Invalid(format!(
                        "indicator source '{}' keys neighbourhoods by district and code \
                         but names no district_code_column",
                        source.indicator
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BCN_YAML: &str = r#"
city: bcn
city_id: 1
districts:
  path: data/raw/bcn-districts.json
  name_column: nom_districte
  code_column: Codi_Districte
  geometry_column: geometria_wgs84
neighbourhoods:
  path: data/raw/bcn-neighbourhoods.json
  name_column: nom_barri
  code_column: codi_barri
  geometry_column: geometria_wgs84
  district_ref:
    column: nom_districte
    key: name
point_features:
  path: data/raw/equipaments.csv
  format: csv
  name_column: Nom_Equipament
  category_column: Tipus_Equipament
  latitude_column: Latitud
  longitude_column: Longitud
  district_code_column: Codi_Districte
  neighbourhood_code_column: Codi_Barri
  category_map:
    Biblioteques de Barcelona: Bibliotecas
    Centres cívics: Centros culturales
  excluded_properties: [Id_Equipament, Notes_Equipament]
indicators:
  sources:
    - path: data/raw/renda.csv
      format: csv
      indicator: Average gross household income
      neighbourhood_key: district-and-code
      district_code_column: Codi_Districte
      neighbourhood_code_column: Codi_Barri
      value_column: Import_Renda
      year: 2022
      reduce: mean
"#;

    #[test]
    fn parses_full_city_config() {
        let config = CityConfig::from_yaml(BCN_YAML).unwrap();
        assert_eq!(config.city_id, 1);
        assert_eq!(config.geo_level_id, 3);

        let districts = config.districts.unwrap();
        assert_eq!(districts.source.format, SourceFormat::Json);
        assert_eq!(districts.code_column, "Codi_Districte");

        let neighbourhoods = config.neighbourhoods.unwrap();
        assert_eq!(neighbourhoods.district_ref.key, DistrictKeyKind::Name);

        let features = config.point_features.unwrap();
        assert_eq!(features.source.format, SourceFormat::Csv);
        assert_eq!(
            features.category_map.resolve("Centres cívics").unwrap(),
            "Centros culturales"
        );

        let indicators = config.indicators.unwrap();
        assert_eq!(indicators.sources.len(), 1);
        assert_eq!(indicators.sources[0].reduce, Reduction::Mean);
        assert_eq!(
            indicators.sources[0].neighbourhood_key,
            NeighbourhoodKey::DistrictAndCode
        );
    }

    #[test]
    fn indicator_source_without_year_is_rejected() {
        let yaml = r#"
city: mad
city_id: 2
indicators:
  sources:
    - path: x.csv
      format: csv
      indicator: Population
      neighbourhood_key: code
      neighbourhood_code_column: cod_barrio
      value_column: valor_indicador
      reduce: last-wins
"#;
        assert!(matches!(
            CityConfig::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn district_and_code_key_requires_district_column() {
        let yaml = r#"
city: bcn
city_id: 1
indicators:
  sources:
    - path: x.csv
      indicator: Income
      neighbourhood_key: district-and-code
      neighbourhood_code_column: Codi_Barri
      value_column: v
      year: 2022
      reduce: mean
"#;
        assert!(matches!(
            CityConfig::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }
}
