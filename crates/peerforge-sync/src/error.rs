//! Error types for the sync module.

use thiserror::Error;

use crate::messages::{Address, ErrorCode};

/// Errors that can occur during sync operations.
///
/// Only failures that abort a whole `fetch` or `announce` are surfaced this
/// way; per-identity and per-seed failures are recorded in the reports.
#[derive(Debug, Error)]
pub enum SyncError {
    /// First contact with the peer failed.
    #[error("connection to {peer} failed: {reason}")]
    Connection { peer: Address, reason: String },

    /// Transport-level error after the connection was established.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// The peer sent a message we did not expect or that breaks limits.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The peer answered with an error.
    #[error("peer error ({code:?}): {message}")]
    Rejected { code: ErrorCode, message: String },

    #[error("store error: {0}")]
    Store(#[from] peerforge_store::StoreError),

    #[error("core error: {0}")]
    Core(#[from] peerforge_core::CoreError),

    /// The operation was cancelled before it could start.
    #[error("sync cancelled")]
    Cancelled,
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
