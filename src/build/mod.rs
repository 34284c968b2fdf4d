//! Index construction: configuration, the artifact producer pipeline, and
//! the build orchestrator that keeps a live index searchable while it is
//! rebuilt or incrementally updated.

pub mod artifact;
pub mod orchestrator;

pub use artifact::{
    ArtifactProducer, ArtifactStatus, DocumentSpec, IndexArtifact, ProduceOptions, produce_all,
};
pub use orchestrator::{IndexEvent, IndexManager, IndexState, SearchContext};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tunables for index construction and incremental updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Shortest indexed prefix of a word or property value.
    #[serde(default = "default_min_variations")]
    pub min_variations: usize,

    /// Longest indexed prefix; longer words get an extra exact entry.
    #[serde(default = "default_max_variations")]
    pub max_variations: usize,

    /// Score offset applied to entries folded in from partial indexes.
    #[serde(default)]
    pub base_score: i32,

    /// Quiet window before a burst of change events becomes one batch.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long a pending artifact may stay unresolved before it is retried.
    #[serde(default = "default_artifact_timeout_ms")]
    pub artifact_timeout_ms: u64,

    /// Starting size of the in-flight artifact window. The window grows
    /// while producers keep up and shrinks when they time out.
    #[serde(default = "default_initial_in_flight")]
    pub initial_in_flight: usize,
}

fn default_min_variations() -> usize {
    2
}

fn default_max_variations() -> usize {
    16
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_artifact_timeout_ms() -> u64 {
    10_000
}

fn default_initial_in_flight() -> usize {
    64
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            min_variations: default_min_variations(),
            max_variations: default_max_variations(),
            base_score: 0,
            debounce_ms: default_debounce_ms(),
            artifact_timeout_ms: default_artifact_timeout_ms(),
            initial_in_flight: default_initial_in_flight(),
        }
    }
}

impl IndexConfig {
    /// Load a config file, or return defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: IndexConfig =
            serde_json::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = IndexConfig::default();
        config.max_variations = 24;
        config.debounce_ms = 100;
        config.save(&path).unwrap();

        let loaded = IndexConfig::load(&path).unwrap();
        assert_eq!(loaded.max_variations, 24);
        assert_eq!(loaded.debounce_ms, 100);
    }

    #[test]
    fn test_config_missing_file_defaults() {
        let loaded = IndexConfig::load(Path::new("/nonexistent/config.json")).unwrap();
        assert_eq!(loaded.min_variations, 2);
    }

    #[test]
    fn test_config_partial_json_fills_defaults() {
        let config: IndexConfig = serde_json::from_str(r#"{"max_variations": 8}"#).unwrap();
        assert_eq!(config.max_variations, 8);
        assert_eq!(config.min_variations, 2);
        assert_eq!(config.debounce_ms, 500);
    }
}
