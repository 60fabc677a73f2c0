//! Record builders: raw source rows → normalized records
//!
//! One builder per entity type, sharing a contract: `build(row)` returns a
//! normalized record or a [`BuildError`]. Builders never panic or propagate
//! past the row boundary — the stage loop records each failure and continues
//! with the next row. All four are pure over `(row, caches)`.

mod district;
mod indicator;
mod neighbourhood;
mod point_feature;
mod records;
mod types;

pub use district::DistrictBuilder;
pub use indicator::IndicatorBuilder;
pub use neighbourhood::NeighbourhoodBuilder;
pub use point_feature::PointFeatureBuilder;
pub use records::{DistrictRecord, IndicatorRecord, NeighbourhoodRecord, PointFeatureRecord};
pub use types::{BuildError, RawRow, RowFailure};
