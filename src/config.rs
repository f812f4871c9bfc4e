use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub max_parent_depth: usize, // Bound on entity parent walks
    pub retry_frames: u32,       // Frames a not-ready material waits before its single retry
    pub nudge_step: f32,         // World units per arrow-key press on the placement reticle
    pub max_diagnostics: usize,
    pub random_seed: Option<u64>, // Seed for one-shot random colors; entropy when absent
    pub ground_size: f32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_parent_depth: 64,
            retry_frames: 1,
            nudge_step: 0.5,
            max_diagnostics: 32,
            random_seed: None,
            ground_size: 50.0,
        }
    }
}

impl SyncConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid sync config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = SyncConfig::from_json(r#"{ "nudge_step": 1.0, "random_seed": 7 }"#).unwrap();
        assert_eq!(config.nudge_step, 1.0);
        assert_eq!(config.random_seed, Some(7));
        assert_eq!(config.max_parent_depth, 64);
        assert_eq!(config.retry_frames, 1);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(SyncConfig::from_json("{ nope").is_err());
    }
}
