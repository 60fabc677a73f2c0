//! Geometry handling: WKT codec and fidelity validation

pub mod codec;
mod fidelity;

pub use codec::{Geometry, GeometryError, SRID_TAG};
pub use fidelity::{FidelityError, FidelityReport, FidelityValidator, DEFAULT_TOLERANCE};
