//! Offline Error Types
//!
//! This module defines the typed error channel for all offline operations.
//! Callers can distinguish "offline", "server error", and "corrupt local data"
//! instead of observing silent no-ops.
//!
//! # Error Categories
//!
//! - `StoreUnavailable` - the local store failed to open; offline features
//!   should be disabled by the embedding application
//! - `Store` - a runtime failure in the local store
//! - `Network` - a transport-level failure talking to the remote API
//! - `ServerRejected` - the remote API answered with a non-success status
//! - `InvalidData` - serialization failures or corrupt local rows
//! - `Offline` - the operation requires connectivity and the device has none
//!
//! # Usage
//!
//! ```rust
//! use studypack::error::OfflineError;
//!
//! let error = OfflineError::server_rejected(503, "maintenance window");
//! assert!(error.is_retryable());
//! ```

use crate::config::ConfigError;
use thiserror::Error;

/// Result type alias for offline operations
pub type Result<T> = std::result::Result<T, OfflineError>;

/// Typed errors for the offline cache and sync subsystem
#[derive(Debug, Error, Clone)]
pub enum OfflineError {
    /// The local store could not be opened or initialized
    #[error("offline store unavailable: {message}")]
    StoreUnavailable {
        /// Human-readable error message
        message: String,
    },

    /// A runtime local store failure
    #[error("store error: {message}")]
    Store {
        /// Human-readable error message
        message: String,
    },

    /// A transport-level network failure
    #[error("network error: {message}")]
    Network {
        /// Human-readable error message
        message: String,
    },

    /// The remote API answered with a non-success status
    #[error("server rejected request ({status}): {message}")]
    ServerRejected {
        /// HTTP status code
        status: u16,
        /// Response body or status text
        message: String,
    },

    /// Serialization failure or corrupt stored data
    #[error("invalid data: {message}")]
    InvalidData {
        /// Human-readable error message
        message: String,
    },

    /// The operation requires connectivity and the device has none
    #[error("device is offline")]
    Offline,

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl OfflineError {
    /// Create a new store-unavailable error
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable { message: message.into() }
    }

    /// Create a new store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store { message: message.into() }
    }

    /// Create a new network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Create a new server-rejected error
    pub fn server_rejected(status: u16, message: impl Into<String>) -> Self {
        Self::ServerRejected { status, message: message.into() }
    }

    /// Create a new invalid-data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData { message: message.into() }
    }

    /// Returns `true` if retrying the operation might succeed.
    ///
    /// Transport failures and server-side errors are retryable; everything
    /// else is not. The sync queue retry policy consults this to decide
    /// between backing off and dead-lettering.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Offline => true,
            Self::ServerRejected { status, .. } => (500..=599).contains(status) || *status == 429,
            _ => false,
        }
    }
}

impl From<sqlx::Error> for OfflineError {
    fn from(err: sqlx::Error) -> Self {
        Self::store(err.to_string())
    }
}

impl From<reqwest::Error> for OfflineError {
    fn from(err: reqwest::Error) -> Self {
        Self::network(err.to_string())
    }
}

impl From<serde_json::Error> for OfflineError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_data(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_network() {
        assert!(OfflineError::network("connection reset").is_retryable());
        assert!(OfflineError::Offline.is_retryable());
    }

    #[test]
    fn test_retryable_server_status() {
        assert!(OfflineError::server_rejected(500, "internal").is_retryable());
        assert!(OfflineError::server_rejected(503, "unavailable").is_retryable());
        assert!(OfflineError::server_rejected(429, "slow down").is_retryable());
        assert!(!OfflineError::server_rejected(404, "not found").is_retryable());
        assert!(!OfflineError::server_rejected(400, "bad request").is_retryable());
    }

    #[test]
    fn test_not_retryable() {
        assert!(!OfflineError::store_unavailable("no disk").is_retryable());
        assert!(!OfflineError::invalid_data("bad row").is_retryable());
    }

    #[test]
    fn test_from_serde_error() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope");
        let error: OfflineError = result.unwrap_err().into();
        match error {
            OfflineError::InvalidData { .. } => {}
            other => panic!("expected InvalidData, got {:?}", other),
        }
    }

    #[test]
    fn test_error_display() {
        let error = OfflineError::server_rejected(503, "maintenance");
        let display = format!("{}", error);
        assert!(display.contains("503"));
        assert!(display.contains("maintenance"));
    }
}
