//! Crate-level configuration, loadable from a TOML file or built in code.
//!
//! Mirrors the teacher's `config::settings` dot-notation style, scaled down to
//! the handful of knobs this crate's ambient stack actually needs.

use crate::constants::DEFAULT_LRU_CAPACITY;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// `sqlite::memory:` or a `sqlite://path/to/file.db` URL (§6).
    pub cache_database_url: String,
    pub promise_database_url: String,
    pub lru_capacity: usize,
    /// Default log level for the `tracing` subscriber this crate installs (§ ambient logging).
    pub log_level: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            cache_database_url: "sqlite::memory:".to_string(),
            promise_database_url: "sqlite::memory:".to_string(),
            lru_capacity: DEFAULT_LRU_CAPACITY,
            log_level: "info".to_string(),
        }
    }
}

impl ManagerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, Error> {
        toml::from_str(contents).map_err(|e| Error::configuration(e.to_string()))
    }

    pub async fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_in_memory_sqlite() {
        let config = ManagerConfig::default();
        assert_eq!(config.cache_database_url, "sqlite::memory:");
        assert_eq!(config.lru_capacity, DEFAULT_LRU_CAPACITY);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults_for_missing_keys() {
        let config = ManagerConfig::from_toml_str("log_level = \"debug\"").unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.lru_capacity, DEFAULT_LRU_CAPACITY);
    }
}
