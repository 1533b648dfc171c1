//! The namespace store.
//!
//! Accepts signed manifests from any source (local authoring or fetch) and
//! keeps exactly one current snapshot per `(repository, identity)`.
//!
//! ## Acceptance rules
//!
//! A `put` succeeds only if, in order:
//! 1. the manifest belongs to the namespace it is written under,
//! 2. the signature verifies against that identity's key,
//! 3. its sequence is strictly greater than the stored one.
//!
//! Any failure leaves the stored snapshot untouched. Steps 3 and the write
//! run under a per-identity lock, so writers to different identities never
//! wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use peerforge_core::{now_millis, Manifest, PeerId, RepoId, Signature, SignedManifest};

use crate::backend::Backend;
use crate::error::{Result, StoreError};
use crate::memory::MemoryBackend;
use crate::namespace::{Namespace, Namespaces, Snapshot};

type WriterLock = Arc<tokio::sync::Mutex<()>>;

/// A namespace replaced by an accepted manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replaced {
    /// The snapshot before the write, if the namespace existed.
    pub previous: Option<Arc<Namespace>>,
    pub current: Arc<Namespace>,
}

/// Signed, sequenced storage of identity namespaces.
pub struct NamespaceStore<B: Backend = MemoryBackend> {
    backend: B,
    writers: Mutex<HashMap<(RepoId, PeerId), WriterLock>>,
}

impl NamespaceStore<MemoryBackend> {
    /// A store backed by memory only.
    pub fn memory() -> Self {
        Self::new(MemoryBackend::new())
    }
}

impl<B: Backend> NamespaceStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            writers: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn writer(&self, repo: &RepoId, identity: &PeerId) -> WriterLock {
        let mut writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(writers.entry((*repo, *identity)).or_default())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Accept a signed manifest for `identity` in `repo`.
    ///
    /// All-or-nothing: on error the previous snapshot is unchanged. Returns
    /// the new snapshot on success.
    pub async fn put(
        &self,
        repo: &RepoId,
        identity: &PeerId,
        manifest: Manifest,
        signature: Signature,
    ) -> Result<Arc<Namespace>> {
        self.replace(repo, identity, manifest, signature)
            .await
            .map(|replaced| replaced.current)
    }

    /// Like [`put`](Self::put), also returning the snapshot it replaced.
    ///
    /// Both snapshots are read under the identity's writer lock, so no other
    /// write lands between them.
    pub async fn replace(
        &self,
        repo: &RepoId,
        identity: &PeerId,
        manifest: Manifest,
        signature: Signature,
    ) -> Result<Replaced> {
        if manifest.identity != *identity {
            return Err(StoreError::IdentityMismatch {
                expected: *identity,
                found: manifest.identity,
            });
        }
        if manifest.repo != *repo {
            return Err(StoreError::MalformedManifest(format!(
                "manifest for repository {} written to {}",
                manifest.repo, repo
            )));
        }

        let signed = SignedManifest {
            manifest,
            signature,
        };
        if let Err(e) = signed.verify() {
            warn!(repo = %repo, identity = %identity.short(), seq = signed.sequence(), "rejecting manifest: {e}");
            return Err(StoreError::from_core(*identity, e));
        }
        let namespace = Namespace::new(signed, now_millis())
            .map_err(|e| StoreError::MalformedManifest(e.to_string()))?;

        let writer = self.writer(repo, identity);
        let _guard = writer.lock().await;

        let previous = self.backend.load(repo, identity).await?;
        if let Some(current) = &previous {
            if namespace.sequence() <= current.sequence() {
                debug!(
                    identity = %identity.short(),
                    stored = current.sequence(),
                    received = namespace.sequence(),
                    "stale manifest"
                );
                return Err(StoreError::StaleManifest {
                    identity: *identity,
                    stored: current.sequence(),
                    received: namespace.sequence(),
                    current: Arc::clone(current),
                });
            }
        }

        let namespace = Arc::new(namespace);
        self.backend.save(Arc::clone(&namespace)).await?;

        debug!(repo = %repo, identity = %identity.short(), seq = namespace.sequence(), "namespace updated");
        Ok(Replaced {
            previous,
            current: namespace,
        })
    }

    /// Convenience wrapper for [`put`](Self::put) taking a bundled manifest.
    pub async fn put_signed(&self, repo: &RepoId, signed: SignedManifest) -> Result<Arc<Namespace>> {
        let identity = signed.manifest.identity;
        self.put(repo, &identity, signed.manifest, signed.signature)
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// The current snapshot for `identity`, or `NotFound`.
    pub async fn get(&self, repo: &RepoId, identity: &PeerId) -> Result<Arc<Namespace>> {
        self.backend
            .load(repo, identity)
            .await?
            .ok_or(StoreError::NotFound {
                repo: *repo,
                identity: *identity,
            })
    }

    /// Like [`get`](Self::get), mapping `NotFound` to `None`.
    pub async fn try_get(&self, repo: &RepoId, identity: &PeerId) -> Result<Option<Arc<Namespace>>> {
        self.backend.load(repo, identity).await
    }

    /// The identities stored for `repo`.
    ///
    /// The listing is fixed when this is called; the returned sequence is
    /// finite and can be restarted or cloned.
    pub async fn namespaces(&self, repo: &RepoId) -> Result<Namespaces> {
        Ok(Namespaces::new(self.backend.identities(repo).await?))
    }

    /// A copy-on-write view of every namespace in `repo`.
    pub async fn snapshot(&self, repo: &RepoId) -> Result<Snapshot> {
        Ok(Snapshot::new(*repo, self.backend.load_all(repo).await?))
    }

    pub async fn repositories(&self) -> Result<Vec<RepoId>> {
        self.backend.repositories().await
    }
}
