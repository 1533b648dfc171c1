//! Tracking policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::alias::Alias;
use crate::error::TrackingError;

/// How widely a local peer replicates.
///
/// As a per-identity policy, `None` blocks the identity while `Trusted` and
/// `All` both mark it as tracked. As a fetch argument, `Trusted` fetches only
/// tracked identities and `All` additionally fetches every namespace the peer
/// advertises that is not blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    None,
    #[default]
    Trusted,
    All,
}

impl Scope {
    /// Whether an identity with this policy is fetched.
    pub fn is_tracked(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Trusted => "trusted",
            Self::All => "all",
        })
    }
}

impl FromStr for Scope {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "trusted" => Ok(Self::Trusted),
            "all" => Ok(Self::All),
            _ => Err(TrackingError::InvalidScope(s.to_string())),
        }
    }
}

/// The local decision about one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingPolicy {
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<Alias>,
}
