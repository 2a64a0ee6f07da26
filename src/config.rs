//! Processor configuration
//!
//! Settings for a hierarchical run, read from JSON. Missing fields take
//! their defaults, so `{}` is a valid configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Worker threads; 0 computes on the calling thread
    pub threads: usize,
    /// Polygons whose bbox area exceeds their area by this ratio are split
    /// (0 disables splitting)
    pub area_ratio: f64,
    /// Polygons with more vertices are split (0 disables splitting)
    pub max_vertex_count: usize,
    pub base_verbosity: i32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            area_ratio: 0.0,
            max_vertex_count: 0,
            base_verbosity: 0,
        }
    }
}

impl ProcessorConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("Failed to parse processor configuration")
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("Invalid configuration in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_missing_fields() {
        let config = ProcessorConfig::from_json_str(r#"{"threads": 4}"#).unwrap();
        assert_eq!(config.threads, 4);
        assert_eq!(config.max_vertex_count, 0);
        assert_eq!(config.area_ratio, 0.0);
    }

    #[test]
    fn test_invalid_json() {
        assert!(ProcessorConfig::from_json_str(r#"{"threads": "many"}"#).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = ProcessorConfig::from_json_file("/nonexistent/processor.json").unwrap_err();
        assert!(format!("{:#}", err).contains("processor.json"));
    }
}
