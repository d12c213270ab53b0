//! Configuration management for Skycast

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub account: AccountConfig,
    #[serde(default)]
    pub pds: PdsConfig,
    #[serde(default)]
    pub whitewind: WhitewindConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account handle, e.g. "alice.bsky.social"
    pub handle: String,
    /// App password generated in the Bluesky settings, not the main password
    pub app_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdsConfig {
    #[serde(default = "default_pds_host")]
    pub host: String,
}

impl Default for PdsConfig {
    fn default() -> Self {
        Self {
            host: default_pds_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitewindConfig {
    #[serde(default = "default_whitewind_host")]
    pub host: String,
}

impl Default for WhitewindConfig {
    fn default() -> Self {
        Self {
            host: default_whitewind_host(),
        }
    }
}

fn default_pds_host() -> String {
    crate::atproto::DEFAULT_PDS_HOST.to_string()
}

fn default_whitewind_host() -> String {
    crate::whitewind::DEFAULT_WHITEWIND_HOST.to_string()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(config)
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
///
/// `SKYCAST_CONFIG` (tilde-expanded) overrides the default
/// `{config_dir}/skycast/config.toml`.
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SKYCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;

    Ok(config_dir.join("skycast").join("config.toml"))
}
