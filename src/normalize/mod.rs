//! Code canonicalization and per-city source configuration

pub mod code;
pub mod config;

pub use code::{pad_code, CodeFormatError, NameTable, UnknownNameError, CODE_WIDTH};
pub use config::{
    BoundarySource, CityConfig, ConfigError, DistrictKeyKind, DistrictRef, IndicatorSource,
    IndicatorStage, NeighbourhoodSource, PointFeatureSource, Reduction, SourceFormat, TableSource,
};
