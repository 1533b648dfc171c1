//! Fetching namespaces from peers.
//!
//! A fetch connects to one peer, decides which identities to ask for from the
//! local tracking policies, then requests and applies each identity's manifest
//! independently. Only first contact is fatal; everything after it is
//! recorded per identity in the [`FetchReport`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use peerforge_core::{Oid, PeerId, RefName, RepoId, SignedManifest};
use peerforge_store::{Backend, NamespaceStore, Replaced, StoreError};
use peerforge_tracking::{Scope, TrackingRegistry};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::messages::Address;
use crate::transport::Transport;

// ─────────────────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────────────────

/// What happened to one identity during a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A newer manifest was stored, changing `updated`.
    Applied {
        sequence: u64,
        updated: Vec<RefUpdate>,
    },
    Skipped(SkipReason),
    Failed(FailReason),
}

/// One ref changed by an applied manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefUpdate {
    Created { name: RefName, oid: Oid },
    Updated { name: RefName, old: Oid, new: Oid },
    Deleted { name: RefName, old: Oid },
}

impl RefUpdate {
    pub fn name(&self) -> &RefName {
        match self {
            Self::Created { name, .. } | Self::Updated { name, .. } | Self::Deleted { name, .. } => {
                name
            }
        }
    }

    /// The differences between two ref sets, in ref name order. Refs with
    /// an unchanged target are left out.
    pub fn diff(old: &BTreeMap<RefName, Oid>, new: &BTreeMap<RefName, Oid>) -> Vec<Self> {
        let mut updates = Vec::new();
        for (name, target) in new {
            match old.get(name) {
                None => updates.push(Self::Created {
                    name: name.clone(),
                    oid: *target,
                }),
                Some(prev) if prev != target => updates.push(Self::Updated {
                    name: name.clone(),
                    old: *prev,
                    new: *target,
                }),
                Some(_) => {}
            }
        }
        for (name, prev) in old {
            if !new.contains_key(name) {
                updates.push(Self::Deleted {
                    name: name.clone(),
                    old: *prev,
                });
            }
        }
        updates.sort_by(|a, b| a.name().cmp(b.name()));
        updates
    }
}

impl fmt::Display for RefUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created { name, oid } => write!(f, "* {name} -> {}", oid.short()),
            Self::Updated { name, old, new } => {
                write!(f, "  {name} {}..{}", old.short(), new.short())
            }
            Self::Deleted { name, old } => write!(f, "- {name} (was {})", old.short()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The peer holds no namespace for the identity.
    NotFound,
    /// The exact same manifest is already stored.
    UpToDate { sequence: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailReason {
    /// The signature did not verify, or the manifest belongs to someone else.
    InvalidSignature,
    /// The peer's sequence does not exceed ours, with different content.
    Stale { stored: u64, received: u64 },
    Malformed(String),
    Timeout,
    Transport(String),
    /// The peer answered the request with an error.
    Rejected(String),
    /// The local store failed while applying.
    Store(String),
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSignature => f.write_str("invalid signature"),
            Self::Stale { stored, received } => {
                write!(f, "stale sequence {received} (stored {stored})")
            }
            Self::Malformed(e) => write!(f, "malformed manifest: {e}"),
            Self::Timeout => f.write_str("request timed out"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Rejected(e) => write!(f, "rejected by peer: {e}"),
            Self::Store(e) => write!(f, "store: {e}"),
        }
    }
}

/// Result of fetching from one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub peer: Address,
    pub outcomes: BTreeMap<PeerId, Outcome>,
}

impl FetchReport {
    fn new(peer: Address) -> Self {
        Self {
            peer,
            outcomes: BTreeMap::new(),
        }
    }

    /// Identities updated, with their new sequence.
    pub fn applied(&self) -> impl Iterator<Item = (&PeerId, u64)> {
        self.outcomes.iter().filter_map(|(id, o)| match o {
            Outcome::Applied { sequence, .. } => Some((id, *sequence)),
            _ => None,
        })
    }

    /// Every ref changed by the fetch, per identity.
    pub fn updated(&self) -> impl Iterator<Item = (&PeerId, &RefUpdate)> {
        self.outcomes.iter().flat_map(|(id, o)| {
            let updated: &[RefUpdate] = match o {
                Outcome::Applied { updated, .. } => updated.as_slice(),
                _ => &[],
            };
            updated.iter().map(move |u| (id, u))
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&PeerId, &SkipReason)> {
        self.outcomes.iter().filter_map(|(id, o)| match o {
            Outcome::Skipped(reason) => Some((id, reason)),
            _ => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = (&PeerId, &FailReason)> {
        self.outcomes.iter().filter_map(|(id, o)| match o {
            Outcome::Failed(reason) => Some((id, reason)),
            _ => None,
        })
    }

    pub fn applied_count(&self) -> usize {
        self.applied().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    pub fn outcome(&self, identity: &PeerId) -> Option<&Outcome> {
        self.outcomes.get(identity)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fetcher
// ─────────────────────────────────────────────────────────────────────────────

/// Pulls namespaces from peers into the local store.
pub struct Fetcher<B: Backend, T: Transport> {
    local: PeerId,
    store: Arc<NamespaceStore<B>>,
    registry: Arc<TrackingRegistry>,
    transport: Arc<T>,
    config: SyncConfig,
}

impl<B: Backend, T: Transport> Clone for Fetcher<B, T> {
    fn clone(&self) -> Self {
        Self {
            local: self.local,
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
        }
    }
}

impl<B: Backend, T: Transport> Fetcher<B, T> {
    pub fn new(
        local: PeerId,
        store: Arc<NamespaceStore<B>>,
        registry: Arc<TrackingRegistry>,
        transport: Arc<T>,
        config: SyncConfig,
    ) -> Self {
        Self {
            local,
            store,
            registry,
            transport,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Fetch every eligible namespace of `repo` from `peer`.
    ///
    /// Tracking policies are read once, when the fetch starts. With
    /// [`Scope::Trusted`] only tracked identities are requested; with
    /// [`Scope::All`] every namespace the peer advertises is added unless the
    /// identity is blocked or was untracked. [`Scope::None`] fetches nothing. The local
    /// identity is never fetched.
    pub async fn fetch(&self, repo: &RepoId, peer: &Address, scope: Scope) -> Result<FetchReport> {
        timeout(self.config.connect_timeout(), self.transport.connect(peer))
            .await
            .map_err(|_| SyncError::Connection {
                peer: peer.clone(),
                reason: "connect timed out".into(),
            })??;

        let candidates = self.candidates(repo, peer, scope).await?;
        debug!(repo = %repo, %peer, %scope, count = candidates.len(), "fetching namespaces");

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_requests.max(1)));
        let mut tasks = JoinSet::new();
        for identity in candidates {
            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .map_err(|_| SyncError::Cancelled)?;
            let this = self.clone();
            let (repo, peer) = (*repo, peer.clone());
            tasks.spawn(async move {
                let outcome = this.fetch_one(&repo, &peer, &identity).await;
                drop(permit);
                (identity, outcome)
            });
        }

        let mut report = FetchReport::new(peer.clone());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((identity, outcome)) => {
                    report.outcomes.insert(identity, outcome);
                }
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => {}
            }
        }

        info!(
            repo = %repo,
            %peer,
            applied = report.applied_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            "fetch complete"
        );
        Ok(report)
    }

    /// Fetch from several peers at once, at most `max_concurrent_fetches` at
    /// a time. Results come back in the order of `peers`.
    pub async fn fetch_all(
        &self,
        repo: &RepoId,
        peers: &[Address],
        scope: Scope,
    ) -> Vec<(Address, Result<FetchReport>)> {
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_fetches.max(1)));
        let mut results: Vec<Option<Result<FetchReport>>> = peers.iter().map(|_| None).collect();
        let mut tasks = JoinSet::new();

        for (i, peer) in peers.iter().enumerate() {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let this = self.clone();
            let (repo, peer) = (*repo, peer.clone());
            tasks.spawn(async move {
                let result = this.fetch(&repo, &peer, scope).await;
                drop(permit);
                (i, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((i, result)) => results[i] = Some(result),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => {}
            }
        }

        peers
            .iter()
            .cloned()
            .zip(results)
            .map(|(peer, result)| (peer, result.unwrap_or(Err(SyncError::Cancelled))))
            .collect()
    }

    async fn candidates(
        &self,
        repo: &RepoId,
        peer: &Address,
        scope: Scope,
    ) -> Result<BTreeSet<PeerId>> {
        if scope == Scope::None {
            return Ok(BTreeSet::new());
        }

        let decisions = self.registry.decisions();
        let mut candidates: BTreeSet<PeerId> = decisions.tracked().copied().collect();

        if scope == Scope::All {
            let advertised = timeout(
                self.config.request_timeout(),
                self.transport.list_namespaces(peer, repo),
            )
            .await
            .map_err(|_| SyncError::Timeout(format!("listing namespaces from {peer}")))??;

            candidates.extend(
                advertised
                    .into_iter()
                    .filter(|id| decisions.admits_discovered(id)),
            );
        }

        candidates.remove(&self.local);
        Ok(candidates)
    }

    async fn fetch_one(&self, repo: &RepoId, peer: &Address, identity: &PeerId) -> Outcome {
        let requested = timeout(
            self.config.request_timeout(),
            self.transport.request_manifest(peer, repo, identity),
        )
        .await;

        let bytes = match requested {
            Err(_) => return self.failed(peer, identity, FailReason::Timeout),
            Ok(Err(SyncError::Rejected { message, .. })) => {
                return self.failed(peer, identity, FailReason::Rejected(message))
            }
            Ok(Err(e)) => return self.failed(peer, identity, FailReason::Transport(e.to_string())),
            Ok(Ok(None)) => return Outcome::Skipped(SkipReason::NotFound),
            Ok(Ok(Some(bytes))) => bytes,
        };

        let signed = match SignedManifest::decode(&bytes) {
            Ok(signed) => signed,
            Err(e) => return self.failed(peer, identity, FailReason::Malformed(e.to_string())),
        };
        let received = signed.clone();

        match self
            .store
            .replace(repo, identity, signed.manifest, signed.signature)
            .await
        {
            Ok(Replaced { previous, current }) => {
                let empty = BTreeMap::new();
                let old = previous.as_ref().map_or(&empty, |ns| ns.signed().refs());
                let updated = RefUpdate::diff(old, current.signed().refs());
                debug!(
                    %peer,
                    identity = %identity.short(),
                    seq = current.sequence(),
                    refs = updated.len(),
                    "applied manifest"
                );
                Outcome::Applied {
                    sequence: current.sequence(),
                    updated,
                }
            }
            Err(StoreError::StaleManifest {
                stored,
                received: seq,
                current,
                ..
            }) => {
                if current.signed() == &received {
                    Outcome::Skipped(SkipReason::UpToDate { sequence: seq })
                } else {
                    self.failed(
                        peer,
                        identity,
                        FailReason::Stale {
                            stored,
                            received: seq,
                        },
                    )
                }
            }
            Err(StoreError::InvalidSignature { .. } | StoreError::IdentityMismatch { .. }) => {
                self.failed(peer, identity, FailReason::InvalidSignature)
            }
            Err(StoreError::MalformedManifest(e)) => {
                self.failed(peer, identity, FailReason::Malformed(e))
            }
            Err(e) => self.failed(peer, identity, FailReason::Store(e.to_string())),
        }
    }

    fn failed(&self, peer: &Address, identity: &PeerId, reason: FailReason) -> Outcome {
        warn!(%peer, identity = %identity.short(), "fetch failed: {reason}");
        Outcome::Failed(reason)
    }
}
