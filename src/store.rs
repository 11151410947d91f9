//! Cached access to the aggregation service, one dataset per resolution.
//!
//! The store holds at most one authoritative collection. A refresh
//! replaces it atomically on success and leaves it untouched on failure,
//! so consumers either see fresh data or stale-but-consistent data,
//! never a torn state. When refreshes race, the one requested most
//! recently wins: a completed fetch for a superseded request is dropped
//! on the floor rather than applied (there is no active cancellation).

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feature::{HexFeatureCollection, PayloadError};
use crate::resolution::ResolutionLevel;

/// Optional server-side filters carried on every fetch, mirroring the
/// aggregation service's query parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SocFilters {
    #[serde(default)]
    pub min_soc: Option<f64>,
    #[serde(default)]
    pub max_soc: Option<f64>,
    #[serde(default)]
    pub min_assets: Option<u64>,
}

impl SocFilters {
    pub fn is_noop(&self) -> bool {
        *self == SocFilters::default()
    }

    /// Whether a cell passes the filters. Cells without an average SOC
    /// are dropped whenever a SOC bound is set, matching the service's
    /// behavior of excluding cells with undefined statistics.
    pub fn matches(&self, properties: &crate::feature::HexProperties) -> bool {
        if self.min_soc.is_some() || self.max_soc.is_some() {
            let Some(avg) = properties.avg_soc else {
                return false;
            };
            if self.min_soc.is_some_and(|min| avg < min) {
                return false;
            }
            if self.max_soc.is_some_and(|max| avg > max) {
                return false;
            }
        }
        if self.min_assets.is_some_and(|min| properties.count < min) {
            return false;
        }
        true
    }
}

/// One fetch against the aggregation service.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub dataset: String,
    pub resolution: ResolutionLevel,
    pub filters: SocFilters,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("data source unavailable: {0}")]
    Source(String),
    #[error("failed to read fixture {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed payload: {0}")]
    Payload(#[from] PayloadError),
}

/// Transport seam to the aggregation service. The core never speaks
/// HTTP itself; embeddings provide whatever transport they use, and
/// [`FixtureSource`] covers tests and offline runs.
pub trait HexSource {
    fn fetch(
        &self,
        request: FetchRequest,
    ) -> impl Future<Output = Result<HexFeatureCollection, FetchError>> + Send;
}

/// What a completed refresh did to the held collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The fetched collection is now the authoritative one.
    Replaced,
    /// A newer request superseded this one; its result was dropped.
    Discarded,
}

#[derive(Default)]
struct StoreState {
    collection: Option<HexFeatureCollection>,
    request_seq: u64,
}

pub struct HexDataStore<S> {
    source: S,
    dataset: String,
    filters: SocFilters,
    state: Arc<Mutex<StoreState>>,
}

impl<S: HexSource> HexDataStore<S> {
    pub fn new(source: S, dataset: impl Into<String>) -> Self {
        Self {
            source,
            dataset: dataset.into(),
            filters: SocFilters::default(),
            state: Arc::new(Mutex::new(StoreState::default())),
        }
    }

    pub fn with_filters(mut self, filters: SocFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Fetches the dataset for `resolution` and installs it. The request
    /// sequence number is taken when `refresh` is called, not when the
    /// returned future first runs, so "requested most recently" stays
    /// well defined even if callers poll futures out of order.
    pub fn refresh(
        &self,
        resolution: ResolutionLevel,
    ) -> impl Future<Output = Result<RefreshOutcome, FetchError>> + '_ {
        let seq = {
            let mut state = self.state.lock().expect("store lock poisoned");
            state.request_seq += 1;
            state.request_seq
        };
        let request = FetchRequest {
            dataset: self.dataset.clone(),
            resolution,
            filters: self.filters,
        };
        async move {
            let fetched = self.source.fetch(request).await;
            let mut state = self.state.lock().expect("store lock poisoned");
            if state.request_seq != seq {
                // A newer refresh was requested while this one was in
                // flight; its response (or error) no longer matters.
                return Ok(RefreshOutcome::Discarded);
            }
            match fetched {
                Ok(collection) => {
                    state.collection = Some(collection);
                    Ok(RefreshOutcome::Replaced)
                }
                // Keep the stale collection; the caller gets the failure
                // signal separately from data replacement.
                Err(err) => Err(err),
            }
        }
    }

    /// The authoritative collection, if any fetch has succeeded yet.
    pub fn collection(&self) -> Option<HexFeatureCollection> {
        self.state
            .lock()
            .expect("store lock poisoned")
            .collection
            .clone()
    }

    pub fn resolution(&self) -> Option<ResolutionLevel> {
        self.state
            .lock()
            .expect("store lock poisoned")
            .collection
            .as_ref()
            .map(|collection| collection.resolution)
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }
}

/// Reads per-resolution GeoJSON files (`res<level>.geojson`) from a
/// directory, standing in for the aggregation service in tests and the
/// offline CLI. Filters are applied after parsing, the way the real
/// service applies its query parameters before responding.
pub struct FixtureSource {
    dir: PathBuf,
}

impl FixtureSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, resolution: ResolutionLevel) -> PathBuf {
        self.dir.join(format!("res{resolution}.geojson"))
    }
}

impl HexSource for FixtureSource {
    async fn fetch(&self, request: FetchRequest) -> Result<HexFeatureCollection, FetchError> {
        let path = self.path_for(request.resolution);
        let payload = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| FetchError::Io {
                path: path.clone(),
                source,
            })?;
        let mut collection = HexFeatureCollection::parse(request.resolution, &payload)?;
        if !request.filters.is_noop() {
            collection
                .features
                .retain(|feature| request.filters.matches(&feature.properties));
        }
        Ok(collection)
    }
}
