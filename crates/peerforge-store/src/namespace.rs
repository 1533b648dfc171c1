//! Stored namespace snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;

use peerforge_core::{
    BranchName, CoreError, Manifest, NamespacedRef, Oid, PeerId, RefName, RepoId, Signature,
    SignedManifest,
};

/// The current, accepted state of one identity's namespace.
///
/// Immutable once created. The store replaces the whole value on update, so
/// readers holding an `Arc<Namespace>` never observe a partial write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    signed: SignedManifest,
    sigrefs: Oid,
    /// Local time the manifest was accepted (Unix ms).
    pub received_at: i64,
}

impl Namespace {
    pub fn new(signed: SignedManifest, received_at: i64) -> Result<Self, CoreError> {
        let sigrefs = signed.sigrefs_oid()?;
        Ok(Self {
            signed,
            sigrefs,
            received_at,
        })
    }

    pub fn repo(&self) -> &RepoId {
        &self.signed.manifest.repo
    }

    pub fn identity(&self) -> &PeerId {
        &self.signed.manifest.identity
    }

    pub fn sequence(&self) -> u64 {
        self.signed.manifest.sequence
    }

    pub fn manifest(&self) -> &Manifest {
        &self.signed.manifest
    }

    pub fn signature(&self) -> &Signature {
        &self.signed.signature
    }

    pub fn signed(&self) -> &SignedManifest {
        &self.signed
    }

    /// `refs/rad/sigrefs`: the object id of the accepted manifest.
    pub fn sigrefs(&self) -> Oid {
        self.sigrefs
    }

    pub fn head(&self, branch: &str) -> Option<Oid> {
        self.signed.manifest.head(branch)
    }

    pub fn heads(&self) -> impl Iterator<Item = (&BranchName, Oid)> {
        self.signed.manifest.heads()
    }

    pub fn identity_doc(&self) -> Option<Oid> {
        self.signed.manifest.identity_doc()
    }

    pub fn patch(&self, id: &Oid) -> Option<Oid> {
        self.signed.manifest.patch(id)
    }

    pub fn patches(&self) -> impl Iterator<Item = (Oid, Oid)> + '_ {
        self.signed.manifest.patches()
    }

    /// Every ref in the namespace, fully qualified, including `refs/rad/sigrefs`.
    pub fn refs(&self) -> Vec<(NamespacedRef, Oid)> {
        let identity = *self.identity();
        let mut refs: Vec<_> = self
            .signed
            .manifest
            .refs
            .iter()
            .map(|(name, oid)| (NamespacedRef::new(identity, name.clone()), *oid))
            .collect();
        refs.push((NamespacedRef::new(identity, RefName::RadSigrefs), self.sigrefs));
        refs.sort();
        refs
    }
}

/// A copy-on-write view of every namespace in one repository.
///
/// Taking a snapshot clones `Arc`s only; later writes to the store are not
/// visible through an existing snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    repo: RepoId,
    namespaces: BTreeMap<PeerId, Arc<Namespace>>,
}

impl Snapshot {
    pub fn new(repo: RepoId, namespaces: BTreeMap<PeerId, Arc<Namespace>>) -> Self {
        Self { repo, namespaces }
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    pub fn get(&self, identity: &PeerId) -> Option<&Arc<Namespace>> {
        self.namespaces.get(identity)
    }

    /// Namespaces in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, &Arc<Namespace>)> {
        self.namespaces.iter()
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

/// A finite, restartable sequence of the identities stored for a repository.
///
/// Cloning yields an independent cursor over the same listing.
#[derive(Debug, Clone)]
pub struct Namespaces {
    identities: Arc<[PeerId]>,
    pos: usize,
}

impl Namespaces {
    pub(crate) fn new(identities: Vec<PeerId>) -> Self {
        Self {
            identities: identities.into(),
            pos: 0,
        }
    }

    /// Rewind to the first identity.
    pub fn restart(&mut self) {
        self.pos = 0;
    }
}

impl Iterator for Namespaces {
    type Item = PeerId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.identities.get(self.pos).copied();
        if id.is_some() {
            self.pos += 1;
        }
        id
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.identities.len() - self.pos;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Namespaces {}
