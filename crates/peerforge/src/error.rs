//! Error types for the node.

use thiserror::Error;

use peerforge_core::{CoreError, Oid, PeerId};
use peerforge_patch::PatchError;
use peerforge_store::StoreError;
use peerforge_sync::SyncError;
use peerforge_tracking::TrackingError;

/// Errors that can occur during node operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("patch error: {0}")]
    Patch(#[from] PatchError),

    /// The remote name is already bound to another namespace.
    #[error("remote {name:?} is already bound to {bound}")]
    NameConflict { name: String, bound: PeerId },

    #[error("no remote named {0:?}")]
    UnknownRemote(String),

    #[error("invalid remote name {name:?}: {reason}")]
    InvalidRemoteName { name: String, reason: String },

    #[error("patch {0} not found")]
    PatchNotFound(Oid),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;
