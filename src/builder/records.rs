//! Normalized record types
//!
//! Field order is the staged-JSON contract — serde serializes struct fields
//! in declaration order, and downstream consumers and the idempotence
//! guarantee depend on it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictRecord {
    pub name: String,
    pub code: String,
    pub city_id: i64,
    pub geom: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighbourhoodRecord {
    pub name: String,
    pub code: String,
    pub district_id: i64,
    pub city_id: i64,
    pub geom: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointFeatureRecord {
    pub feature_type_id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub geom: String,
    pub geo_level_id: i64,
    pub geo_id: i64,
    /// Open bag of source columns not on the exclusion list; ordered so
    /// staged output is deterministic
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRecord {
    pub indicator_def_id: i64,
    pub geo_level_id: i64,
    pub geo_id: i64,
    pub year: i32,
    pub value: f64,
}
