//! Error types for vpnode.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for vpnode operations.
pub type Result<T> = std::result::Result<T, VpnodeError>;

/// Main error type for vpnode.
#[derive(Error, Debug)]
pub enum VpnodeError {
    // Allocation errors
    #[error("Address pool exhausted: no free address left in the allocation domain")]
    PoolExhausted,

    #[error("Invalid peer public key: {reason}")]
    InvalidPublicKey { reason: String },

    // External source errors
    #[error("{source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: &'static str, reason: String },

    #[error("Command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    // Publishing errors
    #[error("Failed to publish {metric}: {reason}")]
    PublishFailed { metric: String, reason: String },

    // Locking errors
    #[error("Failed to lock {path:?}: {source}")]
    LockFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VpnodeError {
    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }

    /// Shorthand for a `SourceUnavailable` error.
    pub fn unavailable(source_name: &'static str, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable { source_name, reason: reason.into() }
    }

    /// Whether this error means the allocation domain is full.
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(self, Self::PoolExhausted)
    }
}
