//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (QUIRE_*)
//! 2. TOML config file (if QUIRE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Resources pre-cached at install time so the application renders offline.
pub const DEFAULT_SHELL_RESOURCES: &[&str] = &[
    "/",
    "/static/css/main.css",
    "/static/css/dashboard.css",
    "/static/css/form.css",
    "/static/css/themes.css",
    "/static/js/main.js",
    "/static/js/dashboard.js",
    "/static/js/form.js",
    "/static/js/theme-switcher.js",
    "/static/js/version-history.js",
    "/static/js/keyboard-shortcuts.js",
    "/static/manifest.json",
    "/analytics",
    "/admin",
    "/offline",
];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (QUIRE_*)
/// 2. TOML config file (if QUIRE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database backing the storage port.
    ///
    /// Set via QUIRE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Storage key under which all version logs live as one JSON object.
    #[serde(default = "default_versions_key")]
    pub versions_key: String,

    /// Maximum versions retained per document.
    ///
    /// Set via QUIRE_MAX_VERSIONS environment variable.
    #[serde(default = "default_max_versions")]
    pub max_versions: usize,

    /// Build tag that prefixes every cache generation name.
    ///
    /// Set via QUIRE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin that shell resources and relative request paths resolve against.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Paths pre-cached into the static generation at install time.
    #[serde(default = "default_shell_resources")]
    pub shell_resources: Vec<String>,

    /// Path of the page served when neither network nor cache can answer.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Path prefix treated as long-lived static assets.
    #[serde(default = "default_assets_prefix")]
    pub assets_prefix: String,

    /// Run install and activation when the server boots.
    #[serde(default = "default_true")]
    pub install_on_start: bool,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via QUIRE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./quire.sqlite")
}

fn default_versions_key() -> String {
    "document_versions".into()
}

fn default_max_versions() -> usize {
    20
}

fn default_cache_version() -> String {
    "quire-v2.0.0".into()
}

fn default_origin() -> String {
    "http://localhost:8000".into()
}

fn default_shell_resources() -> Vec<String> {
    DEFAULT_SHELL_RESOURCES.iter().map(|s| s.to_string()).collect()
}

fn default_offline_page() -> String {
    "/offline".into()
}

fn default_assets_prefix() -> String {
    "/static/".into()
}

fn default_user_agent() -> String {
    "quire/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            versions_key: default_versions_key(),
            max_versions: default_max_versions(),
            cache_version: default_cache_version(),
            origin: default_origin(),
            shell_resources: default_shell_resources(),
            offline_page: default_offline_page(),
            assets_prefix: default_assets_prefix(),
            install_on_start: true,
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `QUIRE_`
    /// 2. TOML file from `QUIRE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed, or
    /// validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("QUIRE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("QUIRE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./quire.sqlite"));
        assert_eq!(config.versions_key, "document_versions");
        assert_eq!(config.max_versions, 20);
        assert_eq!(config.cache_version, "quire-v2.0.0");
        assert_eq!(config.offline_page, "/offline");
        assert_eq!(config.assets_prefix, "/static/");
        assert_eq!(config.shell_resources.len(), DEFAULT_SHELL_RESOURCES.len());
        assert!(config.install_on_start);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_shell_list_contains_offline_page() {
        let config = AppConfig::default();
        assert!(config.shell_resources.contains(&config.offline_page));
    }
}
