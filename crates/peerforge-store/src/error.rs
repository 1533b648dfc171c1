//! Error types for the store module.

use std::sync::Arc;

use thiserror::Error;

use peerforge_core::{CoreError, PeerId, RepoId};

use crate::namespace::Namespace;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The manifest signature does not verify against the identity's key.
    #[error("invalid signature on manifest for {identity}")]
    InvalidSignature { identity: PeerId },

    /// The manifest is signed for a different namespace than the one written.
    #[error("manifest for {found} cannot be stored under {expected}")]
    IdentityMismatch { expected: PeerId, found: PeerId },

    /// The manifest's sequence does not exceed the stored one.
    #[error("stale manifest for {identity}: stored sequence {stored}, received {received}")]
    StaleManifest {
        identity: PeerId,
        stored: u64,
        received: u64,
        /// The snapshot that was current when the manifest was refused.
        current: Arc<Namespace>,
    },

    #[error("namespace {identity} not found in {repo}")]
    NotFound { repo: RepoId, identity: PeerId },

    /// The manifest breaks the ref layout or could not be decoded.
    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("migration error: {0}")]
    Migration(String),

    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Map a core error raised while checking a manifest for `identity`.
    pub fn from_core(identity: PeerId, err: CoreError) -> Self {
        match err {
            CoreError::InvalidSignature | CoreError::InvalidIdentity(_) => {
                Self::InvalidSignature { identity }
            }
            other => Self::MalformedManifest(other.to_string()),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
