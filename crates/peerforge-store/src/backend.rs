//! Backend trait: the persistence seam under the namespace store.
//!
//! A backend only stores and loads whole snapshots. Signature checks,
//! sequence ordering and per-identity locking live in
//! [`NamespaceStore`](crate::NamespaceStore), so every backend gets the same
//! acceptance rules.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use peerforge_core::{PeerId, RepoId};

use crate::error::Result;
use crate::namespace::Namespace;

/// Async interface for namespace persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` is used internally to avoid blocking the runtime.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Load the snapshot for one identity.
    async fn load(&self, repo: &RepoId, identity: &PeerId) -> Result<Option<Arc<Namespace>>>;

    /// Replace the snapshot for `namespace.identity()` in one atomic step.
    async fn save(&self, namespace: Arc<Namespace>) -> Result<()>;

    /// Identities with a stored namespace in `repo`, in identity order.
    async fn identities(&self, repo: &RepoId) -> Result<Vec<PeerId>>;

    /// Every stored namespace in `repo`.
    async fn load_all(&self, repo: &RepoId) -> Result<BTreeMap<PeerId, Arc<Namespace>>>;

    /// Repositories with at least one stored namespace.
    async fn repositories(&self) -> Result<Vec<RepoId>>;
}
