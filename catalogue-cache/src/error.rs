//! Error types for the cache layer.
//!
//! None of these ever reach a caller of the cached read path: the
//! coordinator turns each one into a fallback plus a log line.

use std::time::Duration;
use thiserror::Error;

/// Cache store and codec failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The store could not be reached.
    #[error("Cache connection failed: {0}")]
    Connection(String),

    /// A store call exceeded its deadline.
    #[error("Cache {operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The store rejected or failed a command.
    #[error("Cache command {command} failed: {reason}")]
    Command {
        command: &'static str,
        reason: String,
    },

    /// A value could not be encoded or decoded.
    #[error("Cache codec error: {0}")]
    Codec(String),
}

impl CacheError {
    /// Returns true if this is a decode/encode failure rather than a store failure.
    pub fn is_codec(&self) -> bool {
        matches!(self, Self::Codec(_))
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_dropped() || e.is_connection_refusal() || e.is_io_error() {
            CacheError::Connection(e.to_string())
        } else if e.is_timeout() {
            CacheError::Timeout {
                operation: "redis",
                after: Duration::ZERO,
            }
        } else {
            CacheError::Command {
                command: "redis",
                reason: e.to_string(),
            }
        }
    }
}

/// Result type alias for cache store operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid warming plan: {0}")]
    InvalidPlan(String),

    #[error("Telemetry initialization failed: {0}")]
    Telemetry(String),
}
