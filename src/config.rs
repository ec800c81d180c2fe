//! Offline subsystem configuration
//!
//! Provides the configuration object the coordinator, store, and tracker are
//! constructed from. Built once per application session and passed by
//! reference; there is no ambient global configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Default server URL
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Storage limit reported in offline stats (5 GiB)
pub const DEFAULT_STORAGE_LIMIT_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Minimum viewing-session length worth reporting, in seconds
pub const DEFAULT_MIN_SESSION_SECS: u64 = 10;

/// Maximum upload attempts before a queue item is dead-lettered
pub const DEFAULT_MAX_SYNC_ATTEMPTS: u32 = 5;

/// Base retry backoff interval in seconds
pub const DEFAULT_BACKOFF_BASE_SECS: u64 = 1;

/// Retry backoff cap in seconds (5 minutes)
pub const DEFAULT_BACKOFF_CAP_SECS: u64 = 300;

/// Configuration for the offline cache and sync subsystem
#[derive(Debug, Clone)]
pub struct OfflineConfig {
    /// Base URL of the remote content API
    pub server_url: String,
    /// Path of the local SQLite database file
    pub database_path: PathBuf,
    /// Storage limit reported in stats (not enforced at download time)
    pub storage_limit_bytes: u64,
    /// Viewing sessions shorter than this are discarded
    pub min_session_secs: u64,
    /// Upload attempts before a queue item is dead-lettered
    pub max_sync_attempts: u32,
    /// Base interval for exponential retry backoff
    pub backoff_base_secs: u64,
    /// Cap for exponential retry backoff
    pub backoff_cap_secs: u64,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        let server_url =
            std::env::var("STUDYPACK_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        Self {
            server_url,
            database_path: default_database_path(),
            storage_limit_bytes: DEFAULT_STORAGE_LIMIT_BYTES,
            min_session_secs: DEFAULT_MIN_SESSION_SECS,
            max_sync_attempts: DEFAULT_MAX_SYNC_ATTEMPTS,
            backoff_base_secs: DEFAULT_BACKOFF_BASE_SECS,
            backoff_cap_secs: DEFAULT_BACKOFF_CAP_SECS,
        }
    }
}

impl OfflineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new OfflineConfigBuilder
    pub fn builder() -> OfflineConfigBuilder {
        OfflineConfigBuilder::default()
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }
}

/// Platform data directory for the local database, honoring the
/// `STUDYPACK_DATA_DIR` override.
fn default_database_path() -> PathBuf {
    let mut path = match std::env::var("STUDYPACK_DATA_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let mut base = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
            base.push("studypack");
            base
        }
    };
    path.push("offline.db");
    path
}

/// Builder for OfflineConfig
#[derive(Debug, Default)]
pub struct OfflineConfigBuilder {
    server_url: Option<String>,
    database_path: Option<PathBuf>,
    storage_limit_bytes: Option<u64>,
    min_session_secs: Option<u64>,
    max_sync_attempts: Option<u32>,
    backoff_base_secs: Option<u64>,
    backoff_cap_secs: Option<u64>,
}

impl OfflineConfigBuilder {
    /// Set the remote API base URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Set the local database file path
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Set the reported storage limit
    pub fn storage_limit_bytes(mut self, limit: u64) -> Self {
        self.storage_limit_bytes = Some(limit);
        self
    }

    /// Set the minimum reportable session length
    pub fn min_session_secs(mut self, secs: u64) -> Self {
        self.min_session_secs = Some(secs);
        self
    }

    /// Set the dead-letter attempt cutoff
    pub fn max_sync_attempts(mut self, attempts: u32) -> Self {
        self.max_sync_attempts = Some(attempts);
        self
    }

    /// Set the retry backoff base interval
    pub fn backoff_base_secs(mut self, secs: u64) -> Self {
        self.backoff_base_secs = Some(secs);
        self
    }

    /// Set the retry backoff cap
    pub fn backoff_cap_secs(mut self, secs: u64) -> Self {
        self.backoff_cap_secs = Some(secs);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<OfflineConfig, ConfigError> {
        let defaults = OfflineConfig::default();
        let server_url = self.server_url.unwrap_or(defaults.server_url);
        if !server_url.starts_with("http://") && !server_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(server_url));
        }
        let max_sync_attempts = self.max_sync_attempts.unwrap_or(defaults.max_sync_attempts);
        if max_sync_attempts == 0 {
            return Err(ConfigError::MissingValue("max_sync_attempts"));
        }
        Ok(OfflineConfig {
            server_url,
            database_path: self.database_path.unwrap_or(defaults.database_path),
            storage_limit_bytes: self.storage_limit_bytes.unwrap_or(defaults.storage_limit_bytes),
            min_session_secs: self.min_session_secs.unwrap_or(defaults.min_session_secs),
            max_sync_attempts,
            backoff_base_secs: self.backoff_base_secs.unwrap_or(defaults.backoff_base_secs),
            backoff_cap_secs: self.backoff_cap_secs.unwrap_or(defaults.backoff_cap_secs),
        })
    }
}

/// Configuration errors
#[derive(Debug, Error, Clone)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
}
