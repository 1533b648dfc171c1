//! Error types for the trust registry.

use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// The identifier is not a well-formed public key.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("invalid alias {alias:?}: {reason}")]
    InvalidAlias { alias: String, reason: &'static str },

    #[error("unknown alias: {0}")]
    UnknownAlias(String),

    #[error("invalid scope: {0}")]
    InvalidScope(String),

    /// Policy file could not be parsed or written.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, TrackingError>;
