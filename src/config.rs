use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::search::queue::Strategy;
use crate::search::successor::GeneratorMode;

/// File-supplied defaults for the command line flags. Flags given on the
/// command line win over these.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_strategy")]
    pub strategy: Strategy,
    #[serde(default = "default_generator")]
    pub generator: GeneratorMode,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_trace")]
    pub trace: bool,
    #[serde(default)]
    pub kbound: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            generator: default_generator(),
            seed: None,
            trace: default_trace(),
            kbound: None,
        }
    }
}

impl EngineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }
}

fn default_strategy() -> Strategy {
    Strategy::Dfs
}

fn default_generator() -> GeneratorMode {
    GeneratorMode::Fixed
}

fn default_trace() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_fall_back_per_field() {
        let config: EngineConfig = toml::from_str("strategy = \"bfs\"").unwrap();
        assert_eq!(config.strategy, Strategy::Bfs);
        assert_eq!(config.generator, GeneratorMode::Fixed);
        assert_eq!(config.seed, None);
        assert!(!config.trace);
    }

    #[test]
    fn full_files_parse() {
        let text = "strategy = \"heur\"\ngenerator = \"constrained\"\nseed = 7\ntrace = true\nkbound = 1000\n";
        let config: EngineConfig = toml::from_str(text).unwrap();
        assert_eq!(config.strategy, Strategy::Heur);
        assert_eq!(config.generator, GeneratorMode::Constrained);
        assert_eq!(config.seed, Some(7));
        assert!(config.trace);
        assert_eq!(config.kbound, Some(1000));
    }

    #[test]
    fn unknown_values_are_rejected() {
        assert!(toml::from_str::<EngineConfig>("strategy = \"sideways\"").is_err());
    }

    #[test]
    fn missing_files_mean_defaults() {
        let config = EngineConfig::load_from_file("/definitely/not/there.toml").unwrap();
        assert_eq!(config.strategy, Strategy::Dfs);
        assert_eq!(config.generator, GeneratorMode::Fixed);
    }
}
