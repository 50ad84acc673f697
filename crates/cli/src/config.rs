//! Configuration for the CLI
//!
//! Optional JSON file at `~/.config/drp/config.json`. Command-line flags and
//! `DRP_API_URL` take precedence over it.

use crate::output::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub api_url: Option<String>,
    /// `table` or `json`
    pub default_format: Option<String>,
}

impl Config {
    /// Load from the default location; a missing file is an empty config
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        serde_json::from_str(&content).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    fn config_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("drp").join("config.json"))
    }

    /// Flag value, then config file, then the built-in default
    pub fn resolve_api_url(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn resolve_format(&self, flag: Option<OutputFormat>) -> Result<OutputFormat> {
        if let Some(format) = flag {
            return Ok(format);
        }
        match &self.default_format {
            Some(name) => name
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid default_format in config: {}", e)),
            None => Ok(OutputFormat::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.resolve_api_url(None), DEFAULT_API_URL);
        assert_eq!(config.resolve_format(None).unwrap(), OutputFormat::Table);
    }

    #[test]
    fn test_flags_override_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"api_url": "http://engine:9000", "default_format": "json"}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.resolve_api_url(None), "http://engine:9000");
        assert_eq!(
            config.resolve_api_url(Some("http://other:1".to_string())),
            "http://other:1"
        );
        assert_eq!(config.resolve_format(None).unwrap(), OutputFormat::Json);
        assert_eq!(
            config.resolve_format(Some(OutputFormat::Table)).unwrap(),
            OutputFormat::Table
        );
    }

    #[test]
    fn test_bad_format_is_error() {
        let config = Config {
            api_url: None,
            default_format: Some("xml".to_string()),
        };
        assert!(config.resolve_format(None).is_err());
    }
}
