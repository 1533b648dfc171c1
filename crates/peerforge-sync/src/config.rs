//! Sync configuration.
//!
//! Durations are stored as integer milliseconds so the structs read and
//! write cleanly as JSON.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backoff::BackoffPolicy;
use crate::messages::Address;

/// Configuration for fetch behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Timeout for first contact with a peer.
    pub connect_timeout_ms: u64,
    /// Timeout for a single listing or manifest request.
    pub request_timeout_ms: u64,
    /// Manifest requests in flight per fetch.
    pub max_concurrent_requests: usize,
    /// Peers fetched at once by `fetch_all`.
    pub max_concurrent_fetches: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            max_concurrent_requests: 8,
            max_concurrent_fetches: 4,
        }
    }
}

impl SyncConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Configuration for announcing to seeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnounceConfig {
    pub seeds: Vec<Address>,
    /// Attempts per seed, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub attempt_timeout_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            max_attempts: 5,
            attempt_timeout_ms: 5_000,
            backoff_base_ms: 250,
            backoff_max_ms: 5_000,
        }
    }
}

impl AnnounceConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(self.backoff_base_ms),
            max: Duration::from_millis(self.backoff_max_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{"request_timeout_ms": 200}"#).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_millis(200));
        assert_eq!(config.max_concurrent_fetches, 4);

        let announce: AnnounceConfig =
            serde_json::from_str(r#"{"seeds": ["seed.example:8776"]}"#).unwrap();
        assert_eq!(announce.seeds, vec![Address::from("seed.example:8776")]);
        assert_eq!(announce.max_attempts, 5);
        assert_eq!(announce.backoff().base, Duration::from_millis(250));
    }
}
