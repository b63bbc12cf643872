//! CLI configuration
//!
//! Stored as TOML at `<config_dir>/arbor/config.toml`. Every key is optional;
//! command-line flags and `ARBOR_*` variables take precedence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_DATABASE_FILE: &str = "master.arbor";
pub const DEFAULT_PROMPT: &str = "arbor> ";

/// Get default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("arbor")
}

/// Default location of the configuration file
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("arbor")
        .join("config.toml")
}

/// Configuration for the CLI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl Config {
    pub fn keys() -> &'static [&'static str] {
        &["data_dir", "database_file", "format", "prompt"]
    }

    /// Load the config file, falling back to defaults when absent or invalid
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config file {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "data_dir" => self.data_dir.as_ref().map(|p| p.display().to_string()),
            "database_file" => self.database_file.clone(),
            "format" => self.format.clone(),
            "prompt" => self.prompt.clone(),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "data_dir" => self.data_dir = Some(PathBuf::from(value)),
            "database_file" => self.database_file = Some(value.to_string()),
            "format" => {
                value
                    .parse::<arbor_core::DataFormat>()
                    .map_err(anyhow::Error::msg)?;
                self.format = Some(value.to_string());
            }
            "prompt" => self.prompt = Some(value.to_string()),
            _ => anyhow::bail!(
                "Unknown config key: {}. Available keys: {}",
                key,
                Self::keys().join(", ")
            ),
        }
        Ok(())
    }

    /// Data directory from the config, or the platform default
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn prompt(&self) -> &str {
        self.prompt.as_deref().unwrap_or(DEFAULT_PROMPT)
    }

    /// Defaults written by `config init`
    pub fn initial() -> Self {
        Self {
            data_dir: Some(default_data_dir()),
            database_file: Some(DEFAULT_DATABASE_FILE.to_string()),
            format: Some("basic".to_string()),
            prompt: Some(DEFAULT_PROMPT.to_string()),
        }
    }
}
