//! Human-readable aliases for identities.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TrackingError;

/// Maximum alias length in bytes.
pub const MAX_ALIAS_LEN: usize = 32;

/// A local, human-readable label for an identity.
///
/// The length limit also keeps an alias from ever parsing as a 64-character
/// identity.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Alias(String);

impl Alias {
    pub fn new(alias: impl Into<String>) -> Result<Self, TrackingError> {
        let alias = alias.into();
        let invalid = |reason| TrackingError::InvalidAlias {
            alias: alias.clone(),
            reason,
        };

        if alias.is_empty() {
            return Err(invalid("empty"));
        }
        if alias.len() > MAX_ALIAS_LEN {
            return Err(invalid("longer than 32 bytes"));
        }
        if alias.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(invalid("contains whitespace"));
        }
        Ok(Self(alias))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Alias({})", self.0)
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Alias {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for Alias {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerforge_core::Keypair;

    #[test]
    fn test_alias_validation() {
        assert!(Alias::new("alice").is_ok());
        assert!(Alias::new("bob@laptop").is_ok());
        assert!(Alias::new("").is_err());
        assert!(Alias::new("has space").is_err());
        assert!(Alias::new("x".repeat(33)).is_err());
        assert!(Alias::new("x".repeat(32)).is_ok());
    }

    #[test]
    fn test_alias_cannot_be_identity() {
        let id = Keypair::from_seed(&[3; 32]).peer_id();
        assert!(matches!(
            Alias::new(id.to_hex()),
            Err(TrackingError::InvalidAlias { .. })
        ));
    }
}
