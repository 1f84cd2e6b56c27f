//! Runtime configuration for the progress core.
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::checksum::ChecksumGuard;
use crate::constants::{DEFAULT_APP_VERSION, DEFAULT_CHECKSUM_SALT, DEFAULT_SYNC_DEBOUNCE_MS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Secret appended to every checksum input. Changing it invalidates
    /// existing checksums (loads still succeed, with a warning).
    pub checksum_salt: String,
    pub app_version: String,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Endpoint for pushes, pulls and the version check. Cloud features are
    /// off when unset.
    pub endpoint_url: Option<String>,
    pub debounce_ms: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            checksum_salt: DEFAULT_CHECKSUM_SALT.to_string(),
            app_version: DEFAULT_APP_VERSION.to_string(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            debounce_ms: DEFAULT_SYNC_DEBOUNCE_MS,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("checksum salt must not be empty")]
    EmptySalt,
    #[error("app version must not be empty")]
    EmptyVersion,
    #[error("sync endpoint must be an http(s) URL (got `{0}`)")]
    InvalidEndpoint(String),
}

impl CoreConfig {
    /// Parse and validate configuration JSON. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is invalid.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.checksum_salt.is_empty() {
            return Err(ConfigError::EmptySalt);
        }
        if self.app_version.trim().is_empty() {
            return Err(ConfigError::EmptyVersion);
        }
        if let Some(url) = &self.sync.endpoint_url
            && !(url.starts_with("https://") || url.starts_with("http://"))
        {
            return Err(ConfigError::InvalidEndpoint(url.clone()));
        }
        Ok(())
    }

    #[must_use]
    pub fn checksum_guard(&self) -> ChecksumGuard {
        ChecksumGuard::new(self.checksum_salt.clone())
    }

    #[must_use]
    pub const fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.sync.debounce_ms)
    }

    #[must_use]
    pub fn sync_enabled(&self) -> bool {
        self.sync.endpoint_url.is_some()
    }
}
