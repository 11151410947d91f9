//! Orchestration between the rendering surface and the data pipeline.
//!
//! The rendering collaborator delivers three input events: the viewport
//! settled at some zoom, a polygon was drawn (or edited), the polygon
//! was cleared. Everything else here is reaction: pick the resolution,
//! refresh the store when needed, and keep selection and summary in
//! step with their inputs. No rendering-library types appear anywhere;
//! callers read the outputs back through accessors.

use crate::feature::HexFeatureCollection;
use crate::resolution::{resolution_for_zoom, ResolutionLevel};
use crate::selection::{select, SelectionPolygon, SelectionResult};
use crate::store::{FetchError, HexDataStore, HexSource, RefreshOutcome};
use crate::summary::{self, SummaryStats};

/// What a settle event caused, surfaced so the suppression rule and the
/// refresh policy are observable instead of silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleAction {
    /// The one-shot initialization settle; no fetch was made.
    Ignored,
    /// Resolution unchanged; the same resolution was re-fetched for the
    /// new viewport.
    RefreshedData,
    /// Zoom crossed a threshold; data was fetched at the new resolution.
    SwitchedResolution(ResolutionLevel),
}

pub struct ViewportController<S> {
    store: HexDataStore<S>,
    resolution: ResolutionLevel,
    // Rendering surfaces fire a spurious settle right after map
    // creation; exactly one settle after mount() is swallowed. See
    // DESIGN.md for the limits of this heuristic.
    first_settle_consumed: bool,
    polygon: Option<SelectionPolygon>,
    selection: SelectionResult,
    summary: Option<SummaryStats>,
}

impl<S: HexSource> ViewportController<S> {
    pub fn new(store: HexDataStore<S>) -> Self {
        Self {
            store,
            resolution: ResolutionLevel::DEFAULT,
            first_settle_consumed: false,
            polygon: None,
            selection: SelectionResult::default(),
            summary: None,
        }
    }

    /// Triggers the initial fetch at the default resolution and re-arms
    /// the first-settle suppression. Independent of settle handling: the
    /// first dataset arrives even if no settle event ever fires.
    pub async fn mount(&mut self) -> Result<(), FetchError> {
        self.first_settle_consumed = false;
        self.refresh(self.resolution).await
    }

    /// Handles a viewport-settle event. Exactly one of: ignored (first
    /// settle after mount), re-fetch of the current resolution, or a
    /// switch to the resolution the new zoom maps to -- never two
    /// fetches for one settle.
    pub async fn viewport_settled(&mut self, zoom: f64) -> Result<SettleAction, FetchError> {
        if !self.first_settle_consumed {
            self.first_settle_consumed = true;
            return Ok(SettleAction::Ignored);
        }
        let target = resolution_for_zoom(zoom);
        if target != self.resolution {
            self.resolution = target;
            self.refresh(target).await?;
            Ok(SettleAction::SwitchedResolution(target))
        } else {
            self.refresh(target).await?;
            Ok(SettleAction::RefreshedData)
        }
    }

    /// Replaces the active drawn polygon and synchronously recomputes
    /// selection and summary. Degenerate rings (a drawing tool
    /// mid-gesture) clear them instead of erroring.
    pub fn polygon_drawn(&mut self, rings: &[Vec<(f64, f64)>]) -> Option<&SummaryStats> {
        self.polygon = SelectionPolygon::from_rings(rings).ok();
        self.recompute();
        self.summary.as_ref()
    }

    /// Drops the active polygon; the summary panel goes away with it.
    pub fn polygon_cleared(&mut self) {
        self.polygon = None;
        self.recompute();
    }

    pub fn resolution(&self) -> ResolutionLevel {
        self.resolution
    }

    /// The collection the rendering collaborator should display.
    pub fn collection(&self) -> Option<HexFeatureCollection> {
        self.store.collection()
    }

    pub fn selection(&self) -> &SelectionResult {
        &self.selection
    }

    pub fn summary(&self) -> Option<&SummaryStats> {
        self.summary.as_ref()
    }

    async fn refresh(&mut self, resolution: ResolutionLevel) -> Result<(), FetchError> {
        match self.store.refresh(resolution).await? {
            RefreshOutcome::Replaced => {
                // The dataset changed under the selection; derivations
                // follow their inputs.
                self.recompute();
                Ok(())
            }
            RefreshOutcome::Discarded => Ok(()),
        }
    }

    fn recompute(&mut self) {
        match (&self.polygon, self.store.collection()) {
            (Some(polygon), Some(collection)) => {
                self.selection = select(&collection, polygon);
                self.summary = Some(summary::compute(&self.selection));
            }
            _ => {
                self.selection = SelectionResult::default();
                self.summary = None;
            }
        }
    }
}
