//! Wire data model for the aggregated hex dataset.
//!
//! The external aggregation service answers with a GeoJSON feature
//! collection; each feature is one grid cell carrying per-cell SOC
//! statistics in its properties. The collection held here is replaced
//! wholesale on every refresh and never mutated in place.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use geo::Polygon;
use geojson::{FeatureCollection, GeoJson};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resolution::ResolutionLevel;

/// Per-cell statistics as named on the wire. SOC fields are optional so
/// a cell with `count = 0` (no assets, undefined statistics) parses and
/// is excluded from numeric aggregation instead of poisoning it with NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexProperties {
    pub h3_index: String,
    #[serde(default)]
    pub avg_soc: Option<f64>,
    #[serde(default)]
    pub min_soc: Option<f64>,
    #[serde(default)]
    pub max_soc: Option<f64>,
    pub count: u64,
    #[serde(default)]
    pub soc_color: Option<String>,
}

/// One aggregated grid cell: statistics plus its boundary polygon in
/// geographic coordinates (outer ring, optional holes).
#[derive(Debug, Clone, PartialEq)]
pub struct HexFeature {
    pub properties: HexProperties,
    pub boundary: Polygon<f64>,
}

impl HexFeature {
    pub fn id(&self) -> &str {
        &self.properties.h3_index
    }

    /// Whether this cell carries usable SOC statistics.
    pub fn has_soc_stats(&self) -> bool {
        self.properties.count > 0
            && self.properties.avg_soc.is_some()
            && self.properties.min_soc.is_some()
            && self.properties.max_soc.is_some()
    }
}

/// The dataset for one resolution level.
#[derive(Debug, Clone)]
pub struct HexFeatureCollection {
    pub resolution: ResolutionLevel,
    pub features: Vec<HexFeature>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not a GeoJSON feature collection: {0}")]
    Json(#[from] geojson::Error),
    #[error("feature {index} has no geometry")]
    MissingGeometry { index: usize },
    #[error("feature {index} geometry is not a polygon")]
    NotAPolygon { index: usize },
    #[error("feature {index} has no properties")]
    MissingProperties { index: usize },
    #[error("feature {index} properties malformed: {source}")]
    Properties {
        index: usize,
        source: serde_json::Error,
    },
    #[error("duplicate hex id '{id}'")]
    DuplicateId { id: String },
    #[error("hex '{id}' has SOC values outside 0..=100")]
    SocOutOfRange { id: String },
    #[error("hex '{id}' violates min_soc <= avg_soc <= max_soc")]
    SocOrdering { id: String },
}

impl HexFeatureCollection {
    pub fn new(resolution: ResolutionLevel, features: Vec<HexFeature>) -> Self {
        Self {
            resolution,
            features,
            fetched_at: Utc::now(),
        }
    }

    /// Parses and validates one service payload. Any rejected payload
    /// surfaces as a refresh failure upstream; the previously held
    /// collection stays in place.
    pub fn parse(resolution: ResolutionLevel, payload: &str) -> Result<Self, PayloadError> {
        let geojson = payload.parse::<GeoJson>()?;
        let collection = FeatureCollection::try_from(geojson)?;

        let mut features = Vec::with_capacity(collection.features.len());
        let mut seen = HashSet::new();
        for (index, feature) in collection.features.into_iter().enumerate() {
            let geometry = feature
                .geometry
                .ok_or(PayloadError::MissingGeometry { index })?;
            let boundary = Polygon::<f64>::try_from(geometry.value)
                .map_err(|_| PayloadError::NotAPolygon { index })?;
            let map = feature
                .properties
                .ok_or(PayloadError::MissingProperties { index })?;
            let properties: HexProperties =
                serde_json::from_value(serde_json::Value::Object(map))
                    .map_err(|source| PayloadError::Properties { index, source })?;

            validate_soc(&properties)?;
            if !seen.insert(properties.h3_index.clone()) {
                return Err(PayloadError::DuplicateId {
                    id: properties.h3_index,
                });
            }
            features.push(HexFeature {
                properties,
                boundary,
            });
        }

        Ok(Self::new(resolution, features))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn validate_soc(properties: &HexProperties) -> Result<(), PayloadError> {
    for value in [
        properties.avg_soc,
        properties.min_soc,
        properties.max_soc,
    ]
    .into_iter()
    .flatten()
    {
        if !(0.0..=100.0).contains(&value) {
            return Err(PayloadError::SocOutOfRange {
                id: properties.h3_index.clone(),
            });
        }
    }
    if let (Some(min), Some(avg), Some(max)) = (
        properties.min_soc,
        properties.avg_soc,
        properties.max_soc,
    ) {
        if min > avg || avg > max {
            return Err(PayloadError::SocOrdering {
                id: properties.h3_index.clone(),
            });
        }
    }
    Ok(())
}
