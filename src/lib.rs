//! Geostage: normalization and staging pipeline for municipal open data
//!
//! Ingests heterogeneous open-data sources — district and neighbourhood
//! boundary files, point-of-interest catalogs, statistical indicator
//! tables — and normalizes them into a single relational schema
//! (cities → districts → neighbourhoods → point features / indicators),
//! staged as JSON and bulk-loaded into a table store.
//!
//! # Core Concepts
//!
//! - **Stages**: districts load before neighbourhoods, neighbourhoods
//!   before point features and indicators; each stage resolves foreign keys
//!   against what the previous stages uploaded.
//! - **Lookup caches**: natural keys (names, codes) mapped to the store's
//!   surrogate ids, built once per stage with a single scoped fetch.
//! - **Partial failure**: a bad row is recorded and skipped; only a missing
//!   foreign-key universe aborts a stage.
//!
//! # Example
//!
//! ```no_run
//! use geostage::{CityConfig, MemoryStore, StageRunner};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CityConfig::from_path(Path::new("bcn.yaml"))?;
//! let store = Arc::new(MemoryStore::new());
//! let mut runner = StageRunner::new(store, config, "data/processed");
//! let _reports = runner.run_all().await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod geometry;
pub mod lookup;
pub mod normalize;
pub mod pipeline;
pub mod store;

pub use builder::{
    BuildError, DistrictBuilder, DistrictRecord, IndicatorBuilder, IndicatorRecord,
    NeighbourhoodBuilder, NeighbourhoodRecord, PointFeatureBuilder, PointFeatureRecord, RawRow,
};
pub use geometry::{FidelityReport, FidelityValidator, Geometry, GeometryError, SRID_TAG};
pub use lookup::{FatalLookupError, LookupCache, NaturalKey, NeighbourhoodKey};
pub use normalize::{pad_code, CityConfig, CodeFormatError, NameTable, UnknownNameError};
pub use pipeline::{ErrorCollector, ErrorRecord, Stage, StageError, StageReport, StageRunner};
pub use store::{Filter, MemoryStore, SqliteStore, StoreError, StoreResult, TableStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
