//! CLI configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// YUL compiler binary
    #[serde(default = "default_solc")]
    pub solc: PathBuf,
    /// LLL compiler binary
    #[serde(default = "default_lllc")]
    pub lllc: PathBuf,
    /// Tag the block proposer when converting
    #[serde(default)]
    pub convert_coinbase: bool,
    /// Fork filled when `--fork` is not given
    #[serde(default)]
    pub default_fork: Option<String>,
}

fn default_solc() -> PathBuf {
    PathBuf::from("solc")
}

fn default_lllc() -> PathBuf {
    PathBuf::from("lllc")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            solc: default_solc(),
            lllc: default_lllc(),
            convert_coinbase: false,
            default_fork: None,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".tagfill"))
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Load config from file or return default
    pub fn load() -> Self {
        Self::config_path()
            .filter(|path| path.exists())
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Save config to file
    pub fn save(&self) -> Result<(), std::io::Error> {
        let path = Self::config_path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "Cannot determine config path")
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        std::fs::write(path, content)
    }
}
