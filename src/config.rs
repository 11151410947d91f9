use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::SocFilters;

fn default_zoom() -> f64 {
    8.0
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_fixture_dir() -> PathBuf {
    PathBuf::from("fixtures")
}

/// Deployment-level knobs the core itself never interprets: which
/// dataset the aggregation service is asked for, where the map starts,
/// and how the dev stub service binds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    pub dataset: String,
    #[serde(default = "default_zoom")]
    pub default_zoom: f64,
    #[serde(default)]
    pub filters: SocFilters,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_fixture_dir")]
    pub fixture_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            fixture_dir: default_fixture_dir(),
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            dataset: "test.csv".to_string(),
            default_zoom: default_zoom(),
            filters: SocFilters::default(),
            server: ServerSettings::default(),
        }
    }
}

impl MapConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: MapConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn to_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }
}
