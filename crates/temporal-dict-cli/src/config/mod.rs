//! Configuration loading and resolution.

use std::path::{Path, PathBuf};

use anyhow::Context;
use temporal_dict::{StoreConfig, TemporalStore};

/// Environment variable naming a store config file.
pub const CONFIG_ENV: &str = "TDICT_CONFIG";

/// Config file picked up from the working directory when nothing else is given.
pub const LOCAL_CONFIG: &str = ".tdict/config.json";

/// Resolve the config file path, if any.
///
/// Order: explicit path, then `TDICT_CONFIG`, then `./.tdict/config.json`.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let local = PathBuf::from(LOCAL_CONFIG);
    local.exists().then_some(local)
}

/// Read a store config from a JSON file.
pub fn load_config(path: &Path) -> anyhow::Result<StoreConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    tracing::info!("Loaded store config from {}", path.display());
    Ok(config)
}

/// Command-line settings that take precedence over the config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub max_history: Option<usize>,
    pub origin_sequence: Option<u64>,
}

impl Overrides {
    pub fn apply(self, mut config: StoreConfig) -> StoreConfig {
        if let Some(max) = self.max_history {
            config.max_history = Some(max);
        }
        if let Some(origin) = self.origin_sequence {
            config.origin_sequence = origin;
        }
        config
    }
}

/// Resolve, load, and override the config, then build a store from it.
pub fn open_store(explicit: Option<&str>, overrides: Overrides) -> anyhow::Result<TemporalStore> {
    let config = match resolve_config_path(explicit) {
        Some(path) => load_config(&path)?,
        None => StoreConfig::default(),
    };
    let config = overrides.apply(config);
    TemporalStore::with_config(config).context("Failed to create store")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        assert_eq!(
            resolve_config_path(Some("/tmp/custom.json")),
            Some(PathBuf::from("/tmp/custom.json"))
        );
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_history": 5, "origin_sequence": 10}"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.max_history, Some(5));
        assert_eq!(config.origin_sequence, 10);
    }

    #[test]
    fn test_load_config_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "max_history = 5").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().starts_with("Invalid config file"));
    }

    #[test]
    fn test_overrides_apply_on_top() {
        let config = StoreConfig {
            max_history: Some(5),
            origin_sequence: 3,
        };
        let merged = Overrides {
            max_history: Some(2),
            origin_sequence: None,
        }
        .apply(config);
        assert_eq!(merged.max_history, Some(2));
        assert_eq!(merged.origin_sequence, 3);
    }

    #[test]
    fn test_open_store_rejects_zero_retention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_history": 0}"#).unwrap();

        let err = open_store(path.to_str(), Overrides::default()).unwrap_err();
        assert_eq!(err.to_string(), "Failed to create store");
    }
}
