//! Application configuration management.
//!
//! Configuration is stored at `~/.config/bufood/config.json` and holds the
//! backend location, the last signed-in account and refresh timing.
//! `BUFOOD_API_BASE_URL` overrides the configured backend.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::client::DEFAULT_API_BASE_URL;
use crate::refresh::RefreshSettings;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "bufood";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable that overrides `api_base_url`
pub const API_BASE_URL_ENV: &str = "BUFOOD_API_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub last_account: Option<String>,
    pub refresh: RefreshSettings,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Backend location: environment, then config file, then the default.
    pub fn api_base_url(&self) -> String {
        std::env::var(API_BASE_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    /// Per-account cache directory, so two accounts never share favorites.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(self.account_dir(cache_dir.join(APP_NAME)))
    }

    fn account_dir(&self, base: PathBuf) -> PathBuf {
        match self.last_account.as_deref() {
            Some(account) if !account.is_empty() => {
                let safe: String = account
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() || c == '@' || c == '.' || c == '-' || c == '_' { c } else { '_' })
                    .collect();
                base.join(safe)
            }
            _ => base,
        }
    }
}
