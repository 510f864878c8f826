//! Error types for catalogue operations

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the authoritative catalogue service.
///
/// These are the only errors a caching wrapper lets through to its caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogueError {
    #[error("Product not found: {id}")]
    NotFound { id: String },

    #[error("Storage failure: {reason}")]
    Storage { reason: String },

    #[error("Invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl CatalogueError {
    /// Shorthand for [`CatalogueError::NotFound`].
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Shorthand for [`CatalogueError::Storage`].
    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }

    /// Returns true for [`CatalogueError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for catalogue operations.
pub type CatalogueResult<T> = Result<T, CatalogueError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = CatalogueError::not_found("sock-1");
        assert_eq!(err.to_string(), "Product not found: sock-1");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_timeout_display() {
        let err = CatalogueError::Timeout {
            operation: "List",
            after: Duration::from_secs(10),
        };
        let msg = err.to_string();
        assert!(msg.contains("List"));
        assert!(msg.contains("10s"));
        assert!(!err.is_not_found());
    }
}
