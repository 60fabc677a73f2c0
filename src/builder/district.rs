//! District builder

use super::records::DistrictRecord;
use super::types::{BuildError, RawRow};
use crate::geometry::codec;
use crate::normalize::code::pad_code;
use crate::normalize::config::BoundarySource;

/// Builds district records from a boundary source.
pub struct DistrictBuilder<'a> {
    cfg: &'a BoundarySource,
    city_id: i64,
}

impl<'a> DistrictBuilder<'a> {
    pub fn new(cfg: &'a BoundarySource, city_id: i64) -> Self {
        Self { cfg, city_id }
    }

    pub fn build(&self, row: &RawRow) -> Result<DistrictRecord, BuildError> {
        let name = row.text(&self.cfg.name_column)?.trim().to_string();
        let code = pad_code(&row.text(&self.cfg.code_column)?)?;
        let geometry = codec::parse(&row.text(&self.cfg.geometry_column)?)?;

        Ok(DistrictRecord {
            name,
            code,
            city_id: self.city_id,
            geom: codec::serialize(&geometry),
        })
    }

    /// Identifier used when a row fails
    pub fn identifier(&self, row: &RawRow) -> String {
        row.identifier(&self.cfg.name_column)
    }
}
