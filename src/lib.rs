pub mod config;
pub mod controller;
pub mod feature;
pub mod resolution;
pub mod selection;
pub mod server;
pub mod store;
pub mod summary;

pub use config::MapConfig;
pub use controller::{SettleAction, ViewportController};
pub use feature::{HexFeature, HexFeatureCollection, HexProperties};
pub use resolution::{resolution_for_zoom, ResolutionLevel};
pub use selection::{select, select_rings, SelectionPolygon, SelectionResult};
pub use store::{
    FetchError, FetchRequest, FixtureSource, HexDataStore, HexSource, RefreshOutcome, SocFilters,
};
pub use summary::{compute, SummaryStats};
