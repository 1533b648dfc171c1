//! Node configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use peerforge_core::PeerId;
use peerforge_sync::{AnnounceConfig, SyncConfig};

use crate::error::Result;

/// Configuration for a [`Node`](crate::Node).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```json
/// { "announce": { "seeds": ["seed.example:8776"] } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub sync: SyncConfig,
    pub announce: AnnounceConfig,
    /// Identities whose target branches decide merges and whose close
    /// changes are honoured on every patch.
    pub delegates: Vec<PeerId>,
}

impl NodeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
