//! Engine configuration
//!
//! Loaded from an optional TOML file (`RISK_ENGINE_CONFIG`, default
//! `risk-engine.toml`) overlaid with `RISK_ENGINE_*` environment variables.
//! Nested keys use `__`, e.g. `RISK_ENGINE_SCORING__ENSEMBLE__ML_WEIGHT=0.6`.

use anyhow::{Context, Result};
use risk_lib::{ScoringConfig, TrainerConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "RISK_ENGINE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "risk-engine.toml";
const ENV_PREFIX: &str = "RISK_ENGINE";

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Name attached to every structured log event
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// API server port for health, metrics and the JSON API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Root of the versioned model store
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// JSON snapshot with samples and training rows; empty source when unset
    #[serde(default)]
    pub data_file: Option<PathBuf>,

    /// Train (history first, then synthetic) when no model is stored
    #[serde(default)]
    pub train_on_startup: bool,

    #[serde(default = "default_versions_to_keep")]
    pub versions_to_keep: usize,

    #[serde(default = "default_alert_dedup_secs")]
    pub alert_dedup_secs: u64,

    /// Historical samples per device fed to trend analysis
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub trainer: TrainerConfig,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "risk-engine".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_versions_to_keep() -> usize {
    5
}

fn default_alert_dedup_secs() -> u64 {
    15 * 60
}

fn default_window_size() -> usize {
    20
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            model_dir: default_model_dir(),
            data_file: None,
            train_on_startup: false,
            versions_to_keep: default_versions_to_keep(),
            alert_dedup_secs: default_alert_dedup_secs(),
            window_size: default_window_size(),
            scoring: ScoringConfig::default(),
            trainer: TrainerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from the file named by `RISK_ENGINE_CONFIG` plus the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load from a specific file (missing is fine) plus the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {:?}", path))?;

        let config: EngineConfig = settings
            .try_deserialize()
            .context("Invalid engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scoring.validate().context("Invalid scoring configuration")?;
        self.trainer.validate().context("Invalid trainer configuration")?;
        if self.window_size == 0 {
            anyhow::bail!("window_size must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file() -> NamedTempFile {
        tempfile::Builder::new().suffix(".toml").tempfile().unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.versions_to_keep, 5);
        assert_eq!(config.alert_dedup_secs, 900);
        assert_eq!(config.window_size, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = toml_file();
        writeln!(
            file,
            r#"
instance_name = "lab"
api_port = 9100
model_dir = "/tmp/risk-models"
train_on_startup = true

[scoring.ensemble]
ml_weight = 0.5

[scoring.thresholds.cpu]
warning = 60.0
critical = 80.0
"#
        )
        .unwrap();

        let config = EngineConfig::load_from(file.path()).unwrap();
        assert_eq!(config.instance_name, "lab");
        assert_eq!(config.api_port, 9100);
        assert!(config.train_on_startup);
        assert_eq!(config.scoring.ensemble.ml_weight, 0.5);
        assert_eq!(config.scoring.thresholds.cpu.warning, 60.0);
        assert_eq!(config.scoring.thresholds.ram.warning, 75.0);
        assert_eq!(config.window_size, 20);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let mut file = toml_file();
        writeln!(file, "[scoring.weights]\ncpu = 0.9").unwrap();
        assert!(EngineConfig::load_from(file.path()).is_err());
    }
}
