//! Strong type definitions for Peerforge.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::Blake3Hash;
use crate::error::CoreError;

/// A 32-byte repository identifier.
///
/// Every namespace lives inside exactly one repository.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepoId(pub [u8; 32]);

impl RepoId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive a repository id from its identity document bytes.
    pub fn derive(document: &[u8]) -> Self {
        Self(*Blake3Hash::hash(document).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidRepoId(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidRepoId(format!("{s:?}: expected 32 bytes")))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RepoId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for RepoId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// A 20-byte object id in the version-control engine's object store.
///
/// Commits and patch change records are both addressed by `Oid`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Oid(pub [u8; 20]);

impl Oid {
    pub const LEN: usize = 20;

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Content address: the first 20 bytes of the Blake3 digest of `data`.
    pub fn digest(data: &[u8]) -> Self {
        let hash = Blake3Hash::hash(data);
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&hash.as_bytes()[..20]);
        Self(arr)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The 7-character abbreviation used in status output.
    pub fn short(&self) -> String {
        self.to_hex()[..7].to_string()
    }

    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        if s.len() != Self::LEN * 2 {
            return Err(CoreError::InvalidOid(format!(
                "{s:?}: expected {} hex characters",
                Self::LEN * 2
            )));
        }
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidOid(format!("{s:?}: {e}")))?;
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.short())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Oid {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<&[u8]> for Oid {
    type Error = CoreError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 20] = slice
            .try_into()
            .map_err(|_| CoreError::InvalidOid(format!("expected 20 bytes, got {}", slice.len())))?;
        Ok(Self(arr))
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
