use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;

const APP_DIR: &str = "taskdash";

/// Values read from `config.toml`; every field is optional.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub storage_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl FileConfig {
    /// Reads `path`; a missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

/// Settings that override the file, from the environment or the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub storage_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub base_url: String,
    pub storage_path: PathBuf,
    pub log_dir: PathBuf,
}

impl Config {
    /// Layers defaults, the file, then the overrides.
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, ConfigError> {
        let base_url = overrides
            .base_url
            .or(file.base_url)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?;
        Ok(Self {
            base_url,
            storage_path: overrides
                .storage_path
                .or(file.storage_path)
                .unwrap_or_else(default_storage_path),
            log_dir: file.log_dir.unwrap_or_else(default_log_dir),
        })
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("storage.json")
}

fn default_log_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}
