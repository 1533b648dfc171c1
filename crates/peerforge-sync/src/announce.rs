//! Announcing the local namespace to seeds.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use peerforge_core::{PeerId, RepoId};
use peerforge_store::{Backend, NamespaceStore};

use crate::backoff::Backoff;
use crate::config::AnnounceConfig;
use crate::error::{Result, SyncError};
use crate::messages::{Address, ErrorCode};
use crate::transport::Transport;

/// What happened at one seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnounceOutcome {
    /// The seed accepted the manifest.
    Delivered { attempts: u32, sequence: u64 },
    /// The seed already holds this sequence or a newer one.
    UpToDate { attempts: u32 },
    /// The seed refused the manifest; not retried.
    Rejected { code: ErrorCode, message: String },
    /// Every attempt failed or timed out.
    Unreachable { attempts: u32, last_error: String },
}

impl AnnounceOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. } | Self::UpToDate { .. })
    }
}

/// Result of one announce, keyed by seed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnounceReport {
    pub sequence: u64,
    pub outcomes: BTreeMap<Address, AnnounceOutcome>,
}

impl AnnounceReport {
    pub fn delivered(&self) -> impl Iterator<Item = &Address> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_delivered())
            .map(|(seed, _)| seed)
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered().count()
    }
}

/// Pushes the local identity's manifest to the configured seeds.
pub struct Announcer<B: Backend, T: Transport> {
    local: PeerId,
    store: Arc<NamespaceStore<B>>,
    transport: Arc<T>,
    config: AnnounceConfig,
}

impl<B: Backend, T: Transport> Announcer<B, T> {
    pub fn new(
        local: PeerId,
        store: Arc<NamespaceStore<B>>,
        transport: Arc<T>,
        config: AnnounceConfig,
    ) -> Self {
        Self {
            local,
            store,
            transport,
            config,
        }
    }

    pub fn config(&self) -> &AnnounceConfig {
        &self.config
    }

    /// Push the current local manifest for `repo` to every seed concurrently.
    ///
    /// Fails only if there is no local namespace to announce. Dropping the
    /// returned future aborts the in-flight pushes; seeds that already
    /// accepted keep the manifest.
    pub async fn announce(&self, repo: &RepoId) -> Result<AnnounceReport> {
        let namespace = self.store.get(repo, &self.local).await?;
        let manifest = Bytes::from(namespace.signed().encode()?);
        let mut report = AnnounceReport {
            sequence: namespace.sequence(),
            outcomes: BTreeMap::new(),
        };

        let mut tasks = JoinSet::new();
        for seed in &self.config.seeds {
            let push = Push {
                seed: seed.clone(),
                repo: *repo,
                identity: self.local,
                manifest: manifest.clone(),
                transport: Arc::clone(&self.transport),
                config: self.config.clone(),
            };
            tasks.spawn(async move {
                let outcome = push.run().await;
                (push.seed, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((seed, outcome)) => {
                    report.outcomes.insert(seed, outcome);
                }
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => {}
            }
        }

        info!(
            repo = %repo,
            seq = report.sequence,
            seeds = self.config.seeds.len(),
            delivered = report.delivered_count(),
            "announce complete"
        );
        Ok(report)
    }
}

/// One seed's retry loop.
struct Push<T> {
    seed: Address,
    repo: RepoId,
    identity: PeerId,
    manifest: Bytes,
    transport: Arc<T>,
    config: AnnounceConfig,
}

impl<T: Transport> Push<T> {
    async fn run(&self) -> AnnounceOutcome {
        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = Backoff::new(self.config.backoff());
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match timeout(self.config.attempt_timeout(), self.attempt()).await {
                Ok(Ok(sequence)) => {
                    debug!(seed = %self.seed, attempt, seq = sequence, "announced");
                    return AnnounceOutcome::Delivered {
                        attempts: attempt,
                        sequence,
                    };
                }
                Ok(Err(SyncError::Rejected {
                    code: ErrorCode::Stale,
                    ..
                })) => return AnnounceOutcome::UpToDate { attempts: attempt },
                Ok(Err(SyncError::Rejected { code, message })) if code.is_permanent() => {
                    warn!(seed = %self.seed, ?code, "seed rejected announce: {message}");
                    return AnnounceOutcome::Rejected { code, message };
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = "attempt timed out".into(),
            }

            if attempt < max_attempts {
                let delay = backoff.next_delay();
                debug!(seed = %self.seed, attempt, ?delay, "announce failed, retrying: {last_error}");
                sleep(delay).await;
            }
        }

        warn!(seed = %self.seed, attempts = max_attempts, "seed unreachable: {last_error}");
        AnnounceOutcome::Unreachable {
            attempts: max_attempts,
            last_error,
        }
    }

    async fn attempt(&self) -> Result<u64> {
        self.transport.connect(&self.seed).await?;
        self.transport
            .push_manifest(&self.seed, &self.repo, &self.identity, self.manifest.clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::{MemoryNetwork, MemoryTransport};
    use peerforge_core::{Keypair, Manifest, Oid, RefName};
    use peerforge_store::{MemoryBackend, StoreError};
    use std::time::Duration;

    fn repo() -> RepoId {
        RepoId::derive(b"announce")
    }

    fn config(seeds: &[&str]) -> AnnounceConfig {
        AnnounceConfig {
            seeds: seeds.iter().map(|s| Address::from(*s)).collect(),
            max_attempts: 3,
            attempt_timeout_ms: 100,
            backoff_base_ms: 10,
            backoff_max_ms: 40,
        }
    }

    async fn announcer(
        network: &Arc<MemoryNetwork>,
        me: &Keypair,
        seeds: &[&str],
    ) -> Announcer<MemoryBackend, MemoryTransport> {
        let store = Arc::new(NamespaceStore::memory());
        let signed = Manifest::new(repo(), me.peer_id(), 1)
            .with_ref(RefName::head("main").unwrap(), Oid::from_bytes([1; 20]))
            .sign(me)
            .unwrap();
        store.put_signed(&repo(), signed).await.unwrap();
        Announcer::new(
            me.peer_id(),
            store,
            Arc::new(network.transport()),
            config(seeds),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_announce_reaches_live_seeds() {
        let network = MemoryNetwork::new();
        let seed = Arc::new(NamespaceStore::memory());
        network.register("seed-1", seed.clone()).await;
        network
            .register("seed-2", Arc::new(NamespaceStore::memory()))
            .await;
        network
            .set_latency(&Address::from("seed-2"), Duration::from_millis(500))
            .await;

        let me = Keypair::from_seed(&[7; 32]);
        let announcer = announcer(&network, &me, &["seed-1", "seed-2"]).await;
        let report = announcer.announce(&repo()).await.unwrap();

        assert_eq!(
            report.outcomes[&Address::from("seed-1")],
            AnnounceOutcome::Delivered {
                attempts: 1,
                sequence: 1
            }
        );
        assert!(matches!(
            report.outcomes[&Address::from("seed-2")],
            AnnounceOutcome::Unreachable { attempts: 3, .. }
        ));
        assert_eq!(seed.get(&repo(), &me.peer_id()).await.unwrap().sequence(), 1);

        let again = announcer.announce(&repo()).await.unwrap();
        assert_eq!(
            again.outcomes[&Address::from("seed-1")],
            AnnounceOutcome::UpToDate { attempts: 1 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_announce_retries_until_seed_appears() {
        let network = MemoryNetwork::new();
        let seed = Address::from("late");
        network
            .register(seed.clone(), Arc::new(NamespaceStore::memory()))
            .await;
        network.set_reachable(&seed, false).await;

        let me = Keypair::from_seed(&[7; 32]);
        let announcer = announcer(&network, &me, &["late"]).await;

        let net = Arc::clone(&network);
        let flip = seed.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            net.set_reachable(&flip, true).await;
        });

        let report = announcer.announce(&repo()).await.unwrap();
        assert_eq!(
            report.outcomes[&seed],
            AnnounceOutcome::Delivered {
                attempts: 2,
                sequence: 1
            }
        );
    }

    #[tokio::test]
    async fn test_announce_without_namespace_fails() {
        let network = MemoryNetwork::new();
        let announcer: Announcer<MemoryBackend, MemoryTransport> = Announcer::new(
            Keypair::from_seed(&[7; 32]).peer_id(),
            Arc::new(NamespaceStore::memory()),
            Arc::new(network.transport()),
            config(&["seed"]),
        );
        assert!(matches!(
            announcer.announce(&repo()).await,
            Err(SyncError::Store(StoreError::NotFound { .. }))
        ));
    }
}
