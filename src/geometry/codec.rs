//! WKT codec — parse, validate, and serialize geometry for staging
//!
//! Source files carry geometry as plain WKT text in WGS84. Staged output
//! carries the same text prefixed with the spatial-reference tag
//! (`SRID=4326;`), which is the contract downstream consumers rely on.
//! Parsing keeps the source text verbatim so normalization is the identity
//! transform on geometry, modulo tag-wrapping.

use thiserror::Error;
use wkt::{ToWkt, TryFromWkt};

/// Spatial-reference tag prefixed to every staged geometry. Exact prefix,
/// no surrounding whitespace.
pub const SRID_TAG: &str = "SRID=4326;";

/// Errors raised while decoding geometry text
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("empty geometry text")]
    Empty,

    #[error("malformed WKT: {0}")]
    Malformed(String),

    #[error("unsupported geometry kind: {0}")]
    UnsupportedKind(String),
}

/// A validated shape plus the WKT text it was decoded from.
///
/// The text never includes the SRID tag; [`serialize`] adds it.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    shape: geo_types::Geometry<f64>,
    text: String,
}

impl Geometry {
    /// The parsed shape
    pub fn shape(&self) -> &geo_types::Geometry<f64> {
        &self.shape
    }

    /// Native WKT text, without the SRID tag
    pub fn as_wkt(&self) -> &str {
        &self.text
    }
}

/// Strip the SRID tag from geometry text, if present.
pub fn strip_tag(text: &str) -> &str {
    text.strip_prefix(SRID_TAG).unwrap_or(text)
}

/// Parse WKT text into a validated [`Geometry`].
///
/// Accepts tagged or untagged text. Only the kinds the schema carries
/// (Point, Polygon, MultiPolygon) are accepted; anything else is an
/// [`GeometryError::UnsupportedKind`].
pub fn parse(raw: &str) -> Result<Geometry, GeometryError> {
    let text = strip_tag(raw.trim());
    if text.is_empty() {
        return Err(GeometryError::Empty);
    }

    let shape = geo_types::Geometry::<f64>::try_from_wkt_str(text)
        .map_err(|e| GeometryError::Malformed(e.to_string()))?;

    match shape {
        geo_types::Geometry::Point(_)
        | geo_types::Geometry::Polygon(_)
        | geo_types::Geometry::MultiPolygon(_) => Ok(Geometry {
            shape,
            text: text.to_string(),
        }),
        other => Err(GeometryError::UnsupportedKind(kind_name(&other).to_string())),
    }
}

/// Serialize a geometry in the staged wire format: `SRID=4326;<WKT>`.
pub fn serialize(geometry: &Geometry) -> String {
    format!("{}{}", SRID_TAG, geometry.as_wkt())
}

/// Build a point geometry from a longitude/latitude pair.
pub fn point(longitude: f64, latitude: f64) -> Geometry {
    let shape = geo_types::Geometry::Point(geo_types::Point::new(longitude, latitude));
    let text = shape.wkt_string();
    Geometry { shape, text }
}

/// Vertex-by-vertex numeric comparison within `tolerance`.
///
/// Not topological: two shapes are equal only when they have the same kind,
/// the same ring structure, and pairwise-close coordinates. Used by the
/// fidelity validator, never by normal ingestion.
pub fn equals_within_tolerance(a: &Geometry, b: &Geometry, tolerance: f64) -> bool {
    shapes_close(a.shape(), b.shape(), tolerance)
}

fn kind_name(shape: &geo_types::Geometry<f64>) -> &'static str {
    match shape {
        geo_types::Geometry::Point(_) => "Point",
        geo_types::Geometry::Line(_) => "Line",
        geo_types::Geometry::LineString(_) => "LineString",
        geo_types::Geometry::Polygon(_) => "Polygon",
        geo_types::Geometry::MultiPoint(_) => "MultiPoint",
        geo_types::Geometry::MultiLineString(_) => "MultiLineString",
        geo_types::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo_types::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo_types::Geometry::Rect(_) => "Rect",
        geo_types::Geometry::Triangle(_) => "Triangle",
    }
}

fn shapes_close(a: &geo_types::Geometry<f64>, b: &geo_types::Geometry<f64>, tol: f64) -> bool {
    use geo_types::Geometry::*;
    match (a, b) {
        (Point(a), Point(b)) => coord_close(a.0, b.0, tol),
        (Polygon(a), Polygon(b)) => polygons_close(a, b, tol),
        (MultiPolygon(a), MultiPolygon(b)) => {
            a.0.len() == b.0.len()
                && a.0.iter().zip(&b.0).all(|(p, q)| polygons_close(p, q, tol))
        }
        _ => false,
    }
}

fn polygons_close(a: &geo_types::Polygon<f64>, b: &geo_types::Polygon<f64>, tol: f64) -> bool {
    rings_close(a.exterior(), b.exterior(), tol)
        && a.interiors().len() == b.interiors().len()
        && a.interiors()
            .iter()
            .zip(b.interiors())
            .all(|(r, s)| rings_close(r, s, tol))
}

fn rings_close(a: &geo_types::LineString<f64>, b: &geo_types::LineString<f64>, tol: f64) -> bool {
    a.0.len() == b.0.len() && a.0.iter().zip(&b.0).all(|(p, q)| coord_close(*p, *q, tol))
}

fn coord_close(a: geo_types::Coord<f64>, b: geo_types::Coord<f64>, tol: f64) -> bool {
    (a.x - b.x).abs() <= tol && (a.y - b.y).abs() <= tol
}
