//! Polygon selection over the current hex dataset.
//!
//! The user draws one polygon at a time; every cell whose boundary
//! intersects it (shared edge, overlap or containment) is selected. A
//! linear scan over the collection is plenty at resolutions 6 through 10.

use geo::{Intersects, LineString, Polygon};
use thiserror::Error;

use crate::feature::{HexFeature, HexFeatureCollection};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolygonError {
    #[error("polygon ring needs at least 3 distinct points, got {0}")]
    TooFewPoints(usize),
    #[error("polygon ring is self-intersecting")]
    SelfIntersecting,
}

/// A validated simple polygon in geographic coordinates. Drawing tools
/// can emit degenerate shapes mid-gesture; those fail construction and
/// callers treat them as an empty selection rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPolygon {
    shape: Polygon<f64>,
}

impl SelectionPolygon {
    /// Builds a polygon from raw rings as delivered by a drawing tool:
    /// the first ring is the exterior, any following rings are holes.
    /// The closing duplicate point may be present or absent.
    pub fn from_rings(rings: &[Vec<(f64, f64)>]) -> Result<Self, PolygonError> {
        let Some(exterior) = rings.first() else {
            return Err(PolygonError::TooFewPoints(0));
        };
        let points = open_ring(exterior);
        let distinct = count_distinct(&points);
        if distinct < 3 {
            return Err(PolygonError::TooFewPoints(distinct));
        }
        if ring_self_intersects(&points) {
            return Err(PolygonError::SelfIntersecting);
        }

        let interiors = rings[1..]
            .iter()
            .map(|ring| LineString::from(open_ring(ring)))
            .collect();
        Ok(Self {
            shape: Polygon::new(LineString::from(points), interiors),
        })
    }

    pub fn shape(&self) -> &Polygon<f64> {
        &self.shape
    }
}

/// The ordered subset of the collection intersecting the drawn polygon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionResult {
    pub features: Vec<HexFeature>,
}

impl SelectionResult {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HexFeature> {
        self.features.iter()
    }
}

/// Selects every feature whose boundary intersects the polygon,
/// preserving the collection's iteration order.
pub fn select(collection: &HexFeatureCollection, polygon: &SelectionPolygon) -> SelectionResult {
    let shape = polygon.shape();
    let features = collection
        .features
        .iter()
        .filter(|feature| shape.intersects(&feature.boundary))
        .cloned()
        .collect();
    SelectionResult { features }
}

/// Like [`select`], but for callers holding raw drawn rings: degenerate
/// input yields an empty selection instead of failing.
pub fn select_rings(
    collection: &HexFeatureCollection,
    rings: &[Vec<(f64, f64)>],
) -> SelectionResult {
    match SelectionPolygon::from_rings(rings) {
        Ok(polygon) => select(collection, &polygon),
        Err(_) => SelectionResult::default(),
    }
}

fn open_ring(ring: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut points = ring.to_vec();
    if points.len() >= 2 && points.first() == points.last() {
        points.pop();
    }
    points
}

fn count_distinct(points: &[(f64, f64)]) -> usize {
    let mut distinct: Vec<(f64, f64)> = Vec::with_capacity(points.len());
    for point in points {
        if !distinct.contains(point) {
            distinct.push(*point);
        }
    }
    distinct.len()
}

/// Pairwise proper-crossing test over the open ring. O(n^2) is fine for
/// hand-drawn vertex counts.
fn ring_self_intersects(points: &[(f64, f64)]) -> bool {
    let n = points.len();
    for i in 0..n {
        for j in (i + 1)..n {
            // Edges sharing a vertex cannot properly cross.
            if j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            let (a1, a2) = (points[i], points[(i + 1) % n]);
            let (b1, b2) = (points[j], points[(j + 1) % n]);
            if segments_properly_cross(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    false
}

fn segments_properly_cross(
    p1: (f64, f64),
    p2: (f64, f64),
    q1: (f64, f64),
    q2: (f64, f64),
) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

fn cross(origin: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - origin.0) * (b.1 - origin.1) - (a.1 - origin.1) * (b.0 - origin.0)
}
