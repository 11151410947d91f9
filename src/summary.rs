//! Rollup statistics over a selection.
//!
//! Area is geodesic, not planar: the Chamberlain-Duquette spherical
//! excess algorithm on the mean Earth radius, the same computation the
//! usual web-mapping toolchain performs, so a planar shoelace on raw
//! lon/lat (wrong away from the equator) never enters the numbers.

use geo::{ChamberlainDuquetteArea, LineString, Polygon};
use serde::Serialize;

use crate::selection::SelectionResult;

pub const SQ_METERS_PER_SQ_KM: f64 = 1_000_000.0;

/// Derived panel statistics. Recomputed from scratch on every selection
/// or dataset change; never stored authoritatively.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub hex_count: usize,
    pub total_assets: u64,
    /// Simple per-hex mean of `avg_soc`, not asset-weighted. 0.0 when no
    /// selected cell carries statistics.
    pub avg_soc: f64,
    pub min_soc: Option<f64>,
    pub max_soc: Option<f64>,
    pub total_area_sq_km: f64,
}

impl SummaryStats {
    pub fn empty() -> Self {
        Self {
            hex_count: 0,
            total_assets: 0,
            avg_soc: 0.0,
            min_soc: None,
            max_soc: None,
            total_area_sq_km: 0.0,
        }
    }
}

/// Computes the stats panel for a selection. Pure and idempotent: the
/// same selection always yields bit-identical output.
pub fn compute(selection: &SelectionResult) -> SummaryStats {
    let hex_count = selection.len();
    let mut total_assets = 0u64;
    let mut soc_sum = 0.0;
    let mut soc_cells = 0usize;
    let mut min_soc: Option<f64> = None;
    let mut max_soc: Option<f64> = None;
    let mut area_m2 = 0.0;

    for feature in selection.iter() {
        total_assets += feature.properties.count;
        area_m2 += geodesic_area_m2(&feature.boundary);

        // Cells without assets carry no statistics; they still count
        // toward hex_count and area.
        if !feature.has_soc_stats() {
            continue;
        }
        let properties = &feature.properties;
        soc_sum += properties.avg_soc.unwrap_or(0.0);
        soc_cells += 1;
        min_soc = fold_extreme(min_soc, properties.min_soc, f64::min);
        max_soc = fold_extreme(max_soc, properties.max_soc, f64::max);
    }

    let avg_soc = if soc_cells > 0 {
        soc_sum / soc_cells as f64
    } else {
        0.0
    };

    SummaryStats {
        hex_count,
        total_assets,
        avg_soc,
        min_soc,
        max_soc,
        total_area_sq_km: area_m2 / SQ_METERS_PER_SQ_KM,
    }
}

/// Spherical surface area of a boundary polygon in square meters: outer
/// ring minus any holes.
pub fn geodesic_area_m2(polygon: &Polygon<f64>) -> f64 {
    let outer = ring_area_m2(polygon.exterior());
    let holes: f64 = polygon.interiors().iter().map(ring_area_m2).sum();
    (outer - holes).max(0.0)
}

fn ring_area_m2(ring: &LineString<f64>) -> f64 {
    Polygon::new(ring.clone(), vec![]).chamberlain_duquette_unsigned_area()
}

fn fold_extreme(
    current: Option<f64>,
    candidate: Option<f64>,
    pick: fn(f64, f64) -> f64,
) -> Option<f64> {
    match (current, candidate) {
        (Some(held), Some(new)) => Some(pick(held, new)),
        (None, Some(new)) => Some(new),
        (held, None) => held,
    }
}
