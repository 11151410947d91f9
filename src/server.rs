//! Dev stand-in for the external aggregation service.
//!
//! Serves precomputed per-resolution GeoJSON fixtures over the same
//! endpoint and query contract the real service exposes, so the
//! frontend (or the `summarize` CLI pointed at HTTP glue) can run
//! without the aggregation backend. Producing the aggregates themselves
//! is explicitly not this crate's business.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use geojson::{FeatureCollection, GeoJson};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

use crate::config::ServerSettings;
use crate::feature::HexProperties;
use crate::resolution::{ResolutionLevel, MAX_RESOLUTION, MIN_RESOLUTION};
use crate::store::SocFilters;

/// SOC percentage to display color, the service's five-step gradient.
pub fn soc_color(soc: f64) -> &'static str {
    if soc >= 80.0 {
        "#00FF00"
    } else if soc >= 60.0 {
        "#ADFF2F"
    } else if soc >= 40.0 {
        "#FFD700"
    } else if soc >= 20.0 {
        "#FF8C00"
    } else {
        "#FF0000"
    }
}

/// Per-resolution fixture collections loaded once at startup from
/// `res<level>.geojson` files.
pub struct FixtureCatalog {
    by_resolution: HashMap<u8, FeatureCollection>,
}

impl FixtureCatalog {
    pub fn load(dir: &Path) -> Result<Self> {
        let mut by_resolution = HashMap::new();
        for level in MIN_RESOLUTION..=MAX_RESOLUTION {
            let path = dir.join(format!("res{level}.geojson"));
            if !path.exists() {
                continue;
            }
            let payload = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read fixture {}", path.display()))?;
            let geojson: GeoJson = payload
                .parse()
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            let collection = FeatureCollection::try_from(geojson)
                .with_context(|| format!("{} is not a feature collection", path.display()))?;
            by_resolution.insert(level, collection);
        }
        if by_resolution.is_empty() {
            bail!(
                "no res{MIN_RESOLUTION}.geojson..res{MAX_RESOLUTION}.geojson fixtures in {}",
                dir.display()
            );
        }
        Ok(Self { by_resolution })
    }

    pub fn get(&self, resolution: ResolutionLevel) -> Option<&FeatureCollection> {
        self.by_resolution.get(&resolution.get())
    }
}

/// Applies the service's query filters to a fixture collection and
/// fills in a display color for any cell missing one. Cells whose
/// properties do not parse are dropped, matching the service's habit of
/// excluding malformed rows from its response.
pub fn filter_collection(
    collection: &FeatureCollection,
    filters: &SocFilters,
) -> FeatureCollection {
    let mut features = Vec::with_capacity(collection.features.len());
    for feature in &collection.features {
        let Some(map) = feature.properties.as_ref() else {
            continue;
        };
        let Ok(properties) =
            serde_json::from_value::<HexProperties>(serde_json::Value::Object(map.clone()))
        else {
            continue;
        };
        if !filters.matches(&properties) {
            continue;
        }
        let mut feature = feature.clone();
        if properties.soc_color.is_none() {
            if let (Some(avg), Some(map)) = (properties.avg_soc, feature.properties.as_mut()) {
                map.insert("soc_color".to_string(), json!(soc_color(avg)));
            }
        }
        features.push(feature);
    }
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

struct ServerState {
    dataset: String,
    catalog: FixtureCatalog,
}

#[derive(Debug, Deserialize)]
struct MapQuery {
    file: String,
    resolution: Option<u8>,
    min_soc: Option<f64>,
    max_soc: Option<f64>,
    min_assets: Option<u64>,
}

pub async fn run(settings: ServerSettings, dataset: String) -> Result<()> {
    let catalog = FixtureCatalog::load(&settings.fixture_dir)?;
    let state = Arc::new(ServerState { dataset, catalog });

    let router = Router::new()
        .route("/api/map/h3-soc", get(hex_map))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .context("invalid server address")?;
    println!(
        "[server] fixture aggregation service live at http://{} (Ctrl+C to stop)",
        addr
    );

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    println!("[server] shutting down");
}

async fn hex_map(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<MapQuery>,
) -> impl IntoResponse {
    if query.file != state.dataset {
        return Json(json!({ "error": format!("File {} not found.", query.file) }));
    }
    let level = query.resolution.unwrap_or(ResolutionLevel::DEFAULT.get());
    let Some(resolution) = ResolutionLevel::new(level) else {
        return Json(json!({ "error": format!("Unsupported resolution {level}.") }));
    };
    let Some(collection) = state.catalog.get(resolution) else {
        return Json(json!({ "error": format!("No data at resolution {level}.") }));
    };

    let filters = SocFilters {
        min_soc: query.min_soc,
        max_soc: query.max_soc,
        min_assets: query.min_assets,
    };
    let filtered = filter_collection(collection, &filters);
    Json(serde_json::to_value(&filtered).unwrap_or_else(|_| json!({ "error": "encoding failed" })))
}
