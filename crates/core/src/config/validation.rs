//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_versions` is 0 or exceeds 1000
    /// - `cache_version` is empty or contains `:` (it is part of storage keys)
    /// - `origin` is not an http(s) URL
    /// - `offline_page` is missing from `shell_resources`
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_versions == 0 || self.max_versions > 1000 {
            return Err(ConfigError::Invalid {
                field: "max_versions".into(),
                reason: "must be between 1 and 1000".into(),
            });
        }

        if self.versions_key.is_empty() {
            return Err(ConfigError::Invalid { field: "versions_key".into(), reason: "must not be empty".into() });
        }

        if self.cache_version.is_empty() {
            return Err(ConfigError::Invalid { field: "cache_version".into(), reason: "must not be empty".into() });
        }
        if self.cache_version.contains(':') {
            return Err(ConfigError::Invalid {
                field: "cache_version".into(),
                reason: "must not contain ':'".into(),
            });
        }

        if !(self.origin.starts_with("http://") || self.origin.starts_with("https://")) {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "must be an http(s) URL".into() });
        }

        if !self.offline_page.starts_with('/') {
            return Err(ConfigError::Invalid { field: "offline_page".into(), reason: "must be an absolute path".into() });
        }
        if !self.shell_resources.contains(&self.offline_page) {
            return Err(ConfigError::Invalid {
                field: "shell_resources".into(),
                reason: format!("must include the offline page {}", self.offline_page),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.max_versions < 5 {
            tracing::warn!(max_versions = self.max_versions, "Very small version cap; restores will have little history");
        }

        Ok(())
    }
}
