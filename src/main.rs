use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use geojson::GeoJson;

use hexsoc::{
    config::MapConfig,
    controller::ViewportController,
    resolution::ResolutionLevel,
    store::{FixtureSource, HexDataStore},
    summary::SummaryStats,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Hex-grid SOC map pipeline runner")]
struct Cli {
    /// Path to a YAML map config (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve per-resolution GeoJSON fixtures over the aggregation
    /// service's endpoint contract
    Serve {
        /// Directory holding res6.geojson..res10.geojson fixtures
        #[arg(long)]
        fixtures: Option<PathBuf>,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the pipeline offline: fetch a fixture dataset, apply a drawn
    /// polygon, print the summary panel
    Summarize {
        /// Directory holding the fixture dataset
        #[arg(long, default_value = "fixtures")]
        fixtures: PathBuf,

        /// GeoJSON file with the drawn polygon (first polygon feature)
        #[arg(long)]
        polygon: PathBuf,

        /// Grid resolution to load
        #[arg(long, default_value_t = 8)]
        resolution: u8,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => MapConfig::from_yaml(path)?,
        None => MapConfig::default(),
    };

    match cli.command {
        Command::Serve { fixtures, port } => {
            let mut settings = config.server.clone();
            if let Some(dir) = fixtures {
                settings.fixture_dir = dir;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            hexsoc::server::run(settings, config.dataset).await
        }
        Command::Summarize {
            fixtures,
            polygon,
            resolution,
        } => summarize(&config, fixtures, polygon, resolution).await,
    }
}

async fn summarize(
    config: &MapConfig,
    fixtures: PathBuf,
    polygon_path: PathBuf,
    resolution: u8,
) -> Result<()> {
    let Some(resolution) = ResolutionLevel::new(resolution) else {
        bail!("resolution must be 6..=10");
    };
    let rings = load_polygon_rings(&polygon_path)?;

    let store = HexDataStore::new(FixtureSource::new(fixtures), config.dataset.clone())
        .with_filters(config.filters);
    let mut controller = ViewportController::new(store);
    controller.mount().await?;

    // Walk the controller through the same events a map surface would
    // emit: the initialization settle, a settle at the requested
    // resolution, then the drawn polygon.
    controller.viewport_settled(config.default_zoom).await?;
    controller
        .viewport_settled(zoom_for_resolution(resolution))
        .await?;
    controller.polygon_drawn(&rings);

    let cells = controller
        .collection()
        .map(|collection| collection.len())
        .unwrap_or(0);
    println!(
        "[map] dataset '{}' at resolution {}: {} cells",
        config.dataset,
        controller.resolution(),
        cells
    );
    match controller.summary() {
        Some(stats) => print_panel(stats),
        None => println!("[map] no summary: polygon was degenerate or no data loaded"),
    }
    Ok(())
}

fn print_panel(stats: &SummaryStats) {
    println!("Battery Status");
    println!("  Hexes selected: {}", stats.hex_count);
    println!("  Total assets:   {}", stats.total_assets);
    println!("  Avg SOC:        {:.1}%", stats.avg_soc);
    println!("  Min SOC:        {}", format_soc(stats.min_soc));
    println!("  Max SOC:        {}", format_soc(stats.max_soc));
    println!("  Area selected:  {:.2} km²", stats.total_area_sq_km);
}

fn format_soc(soc: Option<f64>) -> String {
    match soc {
        Some(value) => format!("{value:.1}%"),
        None => "n/a".to_string(),
    }
}

/// A zoom value that resolution_for_zoom maps back to `resolution`;
/// lets the CLI drive the controller with plain settle events.
fn zoom_for_resolution(resolution: ResolutionLevel) -> f64 {
    match resolution.get() {
        10 => 13.0,
        9 => 12.0,
        8 => 10.5,
        7 => 9.5,
        _ => 8.0,
    }
}

/// Pulls the exterior/interior rings of the first polygon feature out
/// of a GeoJSON file.
fn load_polygon_rings(path: &PathBuf) -> Result<Vec<Vec<(f64, f64)>>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read polygon file {}", path.display()))?;
    let geojson: GeoJson = text
        .parse()
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let polygon = match geojson {
        GeoJson::Geometry(geometry) => polygon_rings(geometry.value),
        GeoJson::Feature(feature) => feature.geometry.and_then(|g| polygon_rings(g.value)),
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|feature| feature.geometry)
            .find_map(|geometry| polygon_rings(geometry.value)),
    };
    polygon.with_context(|| format!("no polygon feature in {}", path.display()))
}

fn polygon_rings(value: geojson::Value) -> Option<Vec<Vec<(f64, f64)>>> {
    match value {
        geojson::Value::Polygon(rings) => Some(
            rings
                .into_iter()
                .map(|ring| {
                    ring.iter()
                        .filter_map(|position| match position.as_slice() {
                            [lng, lat, ..] => Some((*lng, *lat)),
                            _ => None,
                        })
                        .collect()
                })
                .collect(),
        ),
        _ => None,
    }
}
