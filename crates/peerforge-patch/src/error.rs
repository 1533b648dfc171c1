//! Error types for the patch module.

use thiserror::Error;

use peerforge_core::{CoreError, Oid};

/// Errors that can occur while authoring or reconstructing patches.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("patch {0} not found")]
    NotFound(Oid),

    /// A change record could not be decoded or breaks the change rules.
    #[error("malformed change: {0}")]
    MalformedChange(String),

    /// The object named by a patch ref is not the opening change.
    #[error("patch {0} does not start with an open change")]
    InvalidRoot(Oid),

    #[error("patch {id} has more than {limit} changes")]
    TooManyChanges { id: Oid, limit: usize },

    /// The object graph could not answer.
    #[error("object graph error: {0}")]
    Graph(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for patch operations.
pub type Result<T> = std::result::Result<T, PatchError>;
