//! Error types for Peerforge core primitives.

use thiserror::Error;

/// Errors raised while parsing, encoding or verifying core primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The identifier is not a well-formed Ed25519 public key.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid repository id: {0}")]
    InvalidRepoId(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),

    /// Bytes could not be decoded, or a decoded value breaks the ref layout.
    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
