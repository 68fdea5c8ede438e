use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment variable naming a config file for the dispatcher.
pub const CONFIG_ENV: &str = "MOVES_DASHBOARD_CONFIG";

/// File locations. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding `<Direction>_<City>.<ext>` datasets.
    pub data_dir: PathBuf,
    /// GeoJSON file with municipality boundaries.
    pub boundaries_path: PathBuf,
    /// Feature property holding the municipality code.
    pub feature_id_property: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("QueryDFs"),
            boundaries_path: PathBuf::from("new.geojson"),
            feature_id_property: "statcode".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Explicit path first, then [`CONFIG_ENV`], then defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => {
                log::info!("Using config {}", path.display());
                Self::from_file(&path)
            }
            None => {
                log::info!("No config given, using defaults");
                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"data_dir": "/srv/moves"}"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/moves"));
        assert_eq!(config.boundaries_path, PathBuf::from("new.geojson"));
        assert_eq!(config.feature_id_property, "statcode");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"data_directory": "x"}"#).unwrap();
        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn explicit_path_wins() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"feature_id_property": "GM_CODE"}"#).unwrap();
        let config = Config::resolve(Some(&path)).unwrap();
        assert_eq!(config.feature_id_property, "GM_CODE");
    }
}
