//! Process configuration.

use std::path::Path;
use std::sync::RwLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `trace` | `debug` | `info` | `warn` | `error`
    pub level: String,
    /// `pretty` | `json`
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}

static GLOBAL_CONFIG: RwLock<Option<Config>> = RwLock::new(None);

/// Install the process-global configuration snapshot.
pub fn set_global(config: Config) {
    let mut slot = GLOBAL_CONFIG.write().unwrap_or_else(|e| e.into_inner());
    *slot = Some(config);
}

/// The current configuration snapshot (defaults when none was installed).
pub fn get() -> Config {
    let slot = GLOBAL_CONFIG.read().unwrap_or_else(|e| e.into_inner());
    slot.clone().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "pretty");
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"log": {"level": "debug"}}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "pretty");
    }

    #[test]
    fn test_global_round_trip() {
        let mut config = Config::default();
        config.log.level = "trace".to_string();
        set_global(config);
        assert_eq!(get().log.level, "trace");
    }
}
