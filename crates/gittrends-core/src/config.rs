//! Application configuration management.
//!
//! Configuration holds the endpoints the sign-in flow talks to and the
//! keychain service name. It is stored at `~/.config/gittrends/config.json`;
//! missing files and missing fields fall back to the public GitTrends
//! defaults. `GITTRENDS_*` environment variables override file values.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "gittrends";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Identity preferences file name
const PREFERENCES_FILE: &str = "preferences.json";

const DEFAULT_API_BASE_URL: &str = "https://gittrendsfunctions.azurewebsites.net/api";
const DEFAULT_GITHUB_BASE_URL: &str = "https://github.com";
const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend that issues the client id and exchanges codes for tokens
    pub api_base_url: String,
    /// Identity provider serving `/login/oauth/authorize`
    pub github_base_url: String,
    pub graphql_url: String,
    pub scopes: Vec<String>,
    pub keyring_service: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            github_base_url: DEFAULT_GITHUB_BASE_URL.to_string(),
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            scopes: vec!["repo".to_string(), "read:user".to_string()],
            keyring_service: APP_NAME.to_string(),
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fields = [
            ("GITTRENDS_API_BASE_URL", &mut self.api_base_url),
            ("GITTRENDS_GITHUB_BASE_URL", &mut self.github_base_url),
            ("GITTRENDS_GRAPHQL_URL", &mut self.graphql_url),
        ];
        for (key, field) in fields {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *field = value;
            }
        }
    }

    /// Scope parameter for the authorize URL.
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }

    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME))
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    pub fn preferences_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(PREFERENCES_FILE))
    }

    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
