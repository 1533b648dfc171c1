//! Sync protocol message types.
//!
//! Every exchange is a single request answered by a single response.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use peerforge_core::{PeerId, RepoId};

/// Network address of a peer or seed.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Message size limits.
pub mod limits {
    /// Max identities in a namespace listing.
    pub const MAX_NAMESPACES_LISTED: usize = 1024;
    /// Max encoded manifest size in bytes.
    pub const MAX_MANIFEST_BYTES: usize = 1 << 20;
    /// Max length of an error message.
    pub const MAX_ERROR_MESSAGE: usize = 1024;
}

/// Requests a peer can answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Which identities does the peer hold for `repo`?
    Namespaces { repo: RepoId },

    /// The current signed manifest of `identity` in `repo`.
    Manifest { repo: RepoId, identity: PeerId },

    /// Offer a signed manifest for the peer to apply.
    Push {
        repo: RepoId,
        identity: PeerId,
        manifest: Bytes,
    },
}

/// Responses to [`Request`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Namespaces { identities: Vec<PeerId> },

    /// `None` if the peer holds no namespace for that identity.
    Manifest { manifest: Option<Bytes> },

    /// A pushed manifest was applied.
    Accepted { sequence: u64 },

    Error { code: ErrorCode, message: String },
}

/// Machine-readable error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    NotFound,
    /// The pushed sequence is not newer than the peer's copy.
    Stale,
    InvalidSignature,
    Malformed,
    LimitExceeded,
    Internal,
}

impl ErrorCode {
    /// Whether retrying the same request can succeed.
    pub fn is_permanent(self) -> bool {
        !matches!(self, Self::Internal)
    }
}

impl Request {
    /// Check if this message respects size limits.
    pub fn validate_limits(&self) -> Result<(), &'static str> {
        if let Request::Push { manifest, .. } = self {
            if manifest.len() > limits::MAX_MANIFEST_BYTES {
                return Err("manifest too large");
            }
        }
        Ok(())
    }
}

impl Response {
    /// Check if this message respects size limits.
    pub fn validate_limits(&self) -> Result<(), &'static str> {
        match self {
            Response::Namespaces { identities } => {
                if identities.len() > limits::MAX_NAMESPACES_LISTED {
                    return Err("too many namespaces listed");
                }
            }
            Response::Manifest {
                manifest: Some(bytes),
            } => {
                if bytes.len() > limits::MAX_MANIFEST_BYTES {
                    return Err("manifest too large");
                }
            }
            Response::Error { message, .. } => {
                if message.len() > limits::MAX_ERROR_MESSAGE {
                    return Err("error message too long");
                }
            }
            Response::Manifest { manifest: None } | Response::Accepted { .. } => {}
        }
        Ok(())
    }

    pub(crate) fn error(code: ErrorCode, message: impl fmt::Display) -> Self {
        let mut message = message.to_string();
        if message.len() > limits::MAX_ERROR_MESSAGE {
            let mut end = limits::MAX_ERROR_MESSAGE;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        Response::Error { code, message }
    }
}
