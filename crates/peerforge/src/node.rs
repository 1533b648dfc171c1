//! The Node: unified API for a Peerforge peer.
//!
//! A node owns one identity and brings together its namespace store,
//! tracking registry, transport, object graph and remote bindings.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use peerforge_core::{now_millis, BranchName, Keypair, Manifest, Oid, PeerId, RefName, RepoId};
use peerforge_patch::{Change, Inspector, ObjectGraph, Patch};
use peerforge_store::{Backend, MemoryBackend, Namespace, NamespaceStore, Snapshot};
use peerforge_sync::memory::MemoryTransport;
use peerforge_sync::{
    Address, AnnounceReport, Announcer, FetchReport, Fetcher, Service, SyncError, Transport,
};
use peerforge_tracking::{Scope, TrackingRegistry};

use crate::config::NodeConfig;
use crate::error::{Error, Result};
use crate::remote::{self, RemoteBindings};

/// A Peerforge peer.
///
/// Provides a unified API for:
/// - Authoring the local namespace
/// - Proposing, revising and closing patches
/// - Inspecting patches across every stored namespace
/// - Fetching from peers and announcing to seeds
/// - Tracking identities and binding remotes
pub struct Node<B: Backend = MemoryBackend, T: Transport = MemoryTransport> {
    keypair: Keypair,
    store: Arc<NamespaceStore<B>>,
    registry: Arc<TrackingRegistry>,
    graph: Arc<dyn ObjectGraph>,
    remotes: RemoteBindings,
    delegates: RwLock<BTreeSet<PeerId>>,
    fetcher: Fetcher<B, T>,
    announcer: Announcer<B, T>,
    /// Serializes local namespace writes so sequences are assigned in order.
    authoring: Mutex<()>,
    config: NodeConfig,
}

impl<B: Backend, T: Transport> Node<B, T> {
    pub fn new(
        keypair: Keypair,
        store: NamespaceStore<B>,
        transport: T,
        graph: Arc<dyn ObjectGraph>,
        config: NodeConfig,
    ) -> Self {
        Self::with_registry(
            keypair,
            store,
            Arc::new(TrackingRegistry::new()),
            transport,
            graph,
            config,
        )
    }

    /// Like [`new`](Self::new), with a registry loaded elsewhere.
    pub fn with_registry(
        keypair: Keypair,
        store: NamespaceStore<B>,
        registry: Arc<TrackingRegistry>,
        transport: T,
        graph: Arc<dyn ObjectGraph>,
        config: NodeConfig,
    ) -> Self {
        let local = keypair.peer_id();
        let store = Arc::new(store);
        let transport = Arc::new(transport);
        let fetcher = Fetcher::new(
            local,
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&transport),
            config.sync.clone(),
        );
        let announcer = Announcer::new(
            local,
            Arc::clone(&store),
            transport,
            config.announce.clone(),
        );

        Self {
            keypair,
            store,
            registry,
            graph,
            remotes: RemoteBindings::new(),
            delegates: RwLock::new(config.delegates.iter().copied().collect()),
            fetcher,
            announcer,
            authoring: Mutex::new(()),
            config,
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.keypair.peer_id()
    }

    pub fn store(&self) -> &Arc<NamespaceStore<B>> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<TrackingRegistry> {
        &self.registry
    }

    pub fn graph(&self) -> &Arc<dyn ObjectGraph> {
        &self.graph
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// This node's request handler, for registering with a transport.
    pub fn service(&self) -> Arc<dyn Service> {
        self.store.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Local Namespace
    // ─────────────────────────────────────────────────────────────────────────

    /// The local namespace in `repo`, if it exists.
    pub async fn namespace(&self, repo: &RepoId) -> Result<Option<Arc<Namespace>>> {
        Ok(self.store.try_get(repo, &self.peer_id()).await?)
    }

    /// Create the local namespace, pointing `refs/rad/id` at the identity
    /// document.
    pub async fn init_namespace(&self, repo: &RepoId, identity_doc: Oid) -> Result<Arc<Namespace>> {
        self.set_ref(repo, RefName::RadId, identity_doc).await
    }

    pub async fn set_ref(&self, repo: &RepoId, name: RefName, oid: Oid) -> Result<Arc<Namespace>> {
        let guard = self.authoring.lock().await;
        self.write_refs(&guard, repo, |refs| {
            refs.insert(name, oid);
        })
        .await
    }

    /// Point `refs/heads/<branch>` at `oid`.
    pub async fn set_head(&self, repo: &RepoId, branch: &str, oid: Oid) -> Result<Arc<Namespace>> {
        self.set_ref(repo, RefName::head(branch)?, oid).await
    }

    pub async fn remove_ref(&self, repo: &RepoId, name: &RefName) -> Result<Arc<Namespace>> {
        let guard = self.authoring.lock().await;
        self.write_refs(&guard, repo, |refs| {
            refs.remove(name);
        })
        .await
    }

    /// Sign and store the next manifest of the local namespace.
    ///
    /// The authoring guard proves the caller holds the lock for the whole
    /// read-modify-write.
    async fn write_refs(
        &self,
        _guard: &MutexGuard<'_, ()>,
        repo: &RepoId,
        update: impl FnOnce(&mut BTreeMap<RefName, Oid>),
    ) -> Result<Arc<Namespace>> {
        let current = self.namespace(repo).await?;
        let (sequence, mut refs) = match &current {
            Some(ns) => (ns.sequence() + 1, ns.manifest().refs.clone()),
            None => (1, BTreeMap::new()),
        };
        update(&mut refs);

        let mut manifest = Manifest::new(*repo, self.peer_id(), sequence);
        manifest.refs = refs;
        let signed = manifest.sign(&self.keypair)?;
        let namespace = self.store.put_signed(repo, signed).await?;

        debug!(repo = %repo, seq = sequence, refs = namespace.manifest().refs.len(), "local namespace updated");
        Ok(namespace)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Patches
    // ─────────────────────────────────────────────────────────────────────────

    /// Open a patch proposing `base..head` against `target`.
    ///
    /// Returns the patch id.
    pub async fn propose_patch(
        &self,
        repo: &RepoId,
        target: &str,
        title: &str,
        base: Oid,
        head: Oid,
    ) -> Result<Oid> {
        let change = Change::open(
            self.peer_id(),
            BranchName::new(target)?,
            title,
            base,
            head,
            now_millis(),
        )
        .sign(&self.keypair)?;
        let id = self.graph.insert_change(change)?;

        let guard = self.authoring.lock().await;
        self.write_refs(&guard, repo, |refs| {
            refs.insert(RefName::Patch(id), id);
        })
        .await?;

        info!(repo = %repo, patch = %id.short(), head = %head.short(), "patch proposed");
        Ok(id)
    }

    /// Add a revision on top of the latest known change. Returns the
    /// revision id.
    pub async fn revise_patch(&self, repo: &RepoId, id: &Oid, base: Oid, head: Oid) -> Result<Oid> {
        let guard = self.authoring.lock().await;
        let patch = self.patch(repo, id).await?.ok_or(Error::PatchNotFound(*id))?;

        let change = Change::revise(patch.tip, self.peer_id(), base, head, now_millis())
            .sign(&self.keypair)?;
        let revision = self.graph.insert_change(change)?;
        self.write_refs(&guard, repo, |refs| {
            refs.insert(RefName::Patch(*id), revision);
        })
        .await?;

        info!(repo = %repo, patch = %id.short(), revision = %revision.short(), head = %head.short(), "patch revised");
        Ok(revision)
    }

    /// Close a patch without merging. Only honoured by readers if this node
    /// is the patch author or one of their delegates.
    pub async fn close_patch(&self, repo: &RepoId, id: &Oid, reason: &str) -> Result<Oid> {
        let guard = self.authoring.lock().await;
        let patch = self.patch(repo, id).await?.ok_or(Error::PatchNotFound(*id))?;

        let change = Change::close(patch.tip, self.peer_id(), reason, now_millis())
            .sign(&self.keypair)?;
        let oid = self.graph.insert_change(change)?;
        self.write_refs(&guard, repo, |refs| {
            refs.insert(RefName::Patch(*id), oid);
        })
        .await?;

        info!(repo = %repo, patch = %id.short(), "patch closed");
        Ok(oid)
    }

    /// Reconstruct one patch from the current store contents.
    pub async fn patch(&self, repo: &RepoId, id: &Oid) -> Result<Option<Patch>> {
        let snapshot = self.store.snapshot(repo).await?;
        let delegates = self.delegates();
        Ok(Inspector::new(&*self.graph, &delegates).inspect(&snapshot, id)?)
    }

    /// Every patch visible in `repo`.
    pub async fn patches(&self, repo: &RepoId) -> Result<Vec<Patch>> {
        let snapshot = self.store.snapshot(repo).await?;
        let delegates = self.delegates();
        Ok(Inspector::new(&*self.graph, &delegates).list(&snapshot))
    }

    pub async fn snapshot(&self, repo: &RepoId) -> Result<Snapshot> {
        Ok(self.store.snapshot(repo).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Delegates
    // ─────────────────────────────────────────────────────────────────────────

    pub fn delegates(&self) -> BTreeSet<PeerId> {
        self.delegates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn add_delegate(&self, identity: PeerId) -> bool {
        self.delegates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity)
    }

    pub fn remove_delegate(&self, identity: &PeerId) -> bool {
        self.delegates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn fetch(&self, repo: &RepoId, peer: &Address, scope: Scope) -> Result<FetchReport> {
        Ok(self.fetcher.fetch(repo, peer, scope).await?)
    }

    /// Fetch from several peers concurrently; one result per peer, in order.
    pub async fn fetch_all(
        &self,
        repo: &RepoId,
        peers: &[Address],
        scope: Scope,
    ) -> Vec<(Address, std::result::Result<FetchReport, SyncError>)> {
        self.fetcher.fetch_all(repo, peers, scope).await
    }

    /// Push the local namespace of `repo` to the configured seeds.
    pub async fn announce(&self, repo: &RepoId) -> Result<AnnounceReport> {
        Ok(self.announcer.announce(repo).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tracking
    // ─────────────────────────────────────────────────────────────────────────

    pub fn track(&self, identity: &str, alias: Option<&str>, scope: Scope) -> Result<PeerId> {
        Ok(self.registry.track(identity, alias, scope)?)
    }

    pub fn untrack(&self, identity: &PeerId) -> bool {
        self.registry.untrack(identity)
    }

    pub fn resolve(&self, alias: &str) -> Result<PeerId> {
        Ok(self.registry.resolve(alias)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Remotes
    // ─────────────────────────────────────────────────────────────────────────

    pub fn remotes(&self) -> &RemoteBindings {
        &self.remotes
    }

    pub fn bind(&self, name: &str, identity: PeerId) -> Result<bool> {
        self.remotes.bind(name, identity)
    }

    pub fn unbind(&self, name: &str) -> Option<PeerId> {
        self.remotes.unbind(name)
    }

    /// Branch heads of the namespace bound to `name`, as
    /// `refs/remotes/<name>/<branch>`.
    pub async fn remote_refs(&self, repo: &RepoId, name: &str) -> Result<BTreeMap<String, Oid>> {
        let identity = self
            .remotes
            .get(name)
            .ok_or_else(|| Error::UnknownRemote(name.to_string()))?;
        let namespace = self.store.get(repo, &identity).await?;
        Ok(remote::remote_refs(name, &namespace))
    }

    pub fn fetch_refspec(&self, name: &str) -> Result<String> {
        let identity = self
            .remotes
            .get(name)
            .ok_or_else(|| Error::UnknownRemote(name.to_string()))?;
        Ok(remote::fetch_refspec(name, &identity))
    }
}
