//! The trust registry.
//!
//! Holds the local tracking decision for every known identity. Mutations take
//! a short write lock; a fetch reads the registry once when it starts, so a
//! change made before `fetch` is called is always observed by that fetch.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use peerforge_core::PeerId;

use crate::alias::Alias;
use crate::error::{Result, TrackingError};
use crate::policy::{Scope, TrackingPolicy};

/// Current version of the persisted policy file.
const FILE_VERSION: u32 = 1;

#[derive(Debug, Default)]
struct Inner {
    policies: BTreeMap<PeerId, TrackingPolicy>,
    /// Index: alias -> identity.
    aliases: BTreeMap<Alias, PeerId>,
    /// Identities untracked since they were last tracked.
    untracked: BTreeSet<PeerId>,
}

#[derive(Serialize, Deserialize)]
struct PolicyFile {
    version: u32,
    policies: BTreeMap<PeerId, TrackingPolicy>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    untracked: BTreeSet<PeerId>,
}

/// Every tracking decision, copied under one lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decisions {
    pub policies: BTreeMap<PeerId, TrackingPolicy>,
    pub untracked: BTreeSet<PeerId>,
}

impl Decisions {
    /// Identities with a policy that allows fetching.
    pub fn tracked(&self) -> impl Iterator<Item = &PeerId> + '_ {
        self.policies
            .iter()
            .filter(|(_, p)| p.scope.is_tracked())
            .map(|(id, _)| id)
    }

    /// Whether an identity discovered on a peer, rather than tracked, may be
    /// fetched. Blocked and untracked identities may not.
    pub fn admits_discovered(&self, id: &PeerId) -> bool {
        !self.untracked.contains(id) && self.policies.get(id).map_or(true, |p| p.scope != Scope::None)
    }
}

/// Thread-safe registry of tracking policies.
#[derive(Debug, Default)]
pub struct TrackingRegistry {
    inner: RwLock<Inner>,
}

impl TrackingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────────

    /// Track an identity given in text form.
    ///
    /// Upsert: calling it again replaces the previous policy (last write
    /// wins). Fails with `InvalidIdentity` if `identity` is not a
    /// well-formed public key.
    pub fn track(&self, identity: &str, alias: Option<&str>, scope: Scope) -> Result<PeerId> {
        let id = PeerId::from_hex(identity)
            .map_err(|e| TrackingError::InvalidIdentity(e.to_string()))?;
        let alias = alias.map(Alias::new).transpose()?;
        self.track_peer(id, alias, scope);
        Ok(id)
    }

    /// Track an already-parsed identity.
    ///
    /// An alias held by another identity moves to this one.
    pub fn track_peer(&self, id: PeerId, alias: Option<Alias>, scope: Scope) {
        let mut inner = self.write();

        if let Some(old) = inner.policies.get(&id).and_then(|p| p.alias.clone()) {
            inner.aliases.remove(&old);
        }
        if let Some(alias) = &alias {
            if let Some(holder) = inner.aliases.insert(alias.clone(), id) {
                if holder != id {
                    if let Some(policy) = inner.policies.get_mut(&holder) {
                        policy.alias = None;
                    }
                }
            }
        }
        inner.policies.insert(id, TrackingPolicy { scope, alias });
        inner.untracked.remove(&id);

        debug!(identity = %id.short(), %scope, "tracking policy set");
    }

    /// Stop tracking an identity. Stored namespaces are left in place.
    ///
    /// The identity is also remembered as untracked, so fetches with scope
    /// `all` skip it when a peer advertises it, until it is tracked again.
    /// Returns whether a policy existed.
    pub fn untrack(&self, id: &PeerId) -> bool {
        let mut inner = self.write();
        inner.untracked.insert(*id);
        match inner.policies.remove(id) {
            Some(policy) => {
                if let Some(alias) = policy.alias {
                    inner.aliases.remove(&alias);
                }
                debug!(identity = %id.short(), "tracking policy removed");
                true
            }
            None => false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve an alias to its identity.
    ///
    /// A string that is not a valid alias cannot name anyone, and is reported
    /// as unknown.
    pub fn resolve(&self, alias: &str) -> Result<PeerId> {
        let unknown = || TrackingError::UnknownAlias(alias.to_string());
        let key = Alias::new(alias).map_err(|_| unknown())?;
        self.read().aliases.get(&key).copied().ok_or_else(unknown)
    }

    pub fn policy(&self, id: &PeerId) -> Option<TrackingPolicy> {
        self.read().policies.get(id).cloned()
    }

    pub fn alias_of(&self, id: &PeerId) -> Option<Alias> {
        self.read().policies.get(id).and_then(|p| p.alias.clone())
    }

    /// Whether the identity has a policy that allows fetching.
    pub fn is_tracked(&self, id: &PeerId) -> bool {
        self.read()
            .policies
            .get(id)
            .is_some_and(|p| p.scope.is_tracked())
    }

    /// Whether the identity is explicitly blocked (scope `none`).
    pub fn is_blocked(&self, id: &PeerId) -> bool {
        self.read()
            .policies
            .get(id)
            .is_some_and(|p| p.scope == Scope::None)
    }

    /// Every tracked identity, in identity order.
    pub fn tracked(&self) -> Vec<PeerId> {
        self.read()
            .policies
            .iter()
            .filter(|(_, p)| p.scope.is_tracked())
            .map(|(id, _)| *id)
            .collect()
    }

    /// A consistent copy of every policy.
    pub fn policies(&self) -> BTreeMap<PeerId, TrackingPolicy> {
        self.read().policies.clone()
    }

    /// Whether the identity was untracked and not tracked since.
    pub fn is_untracked(&self, id: &PeerId) -> bool {
        self.read().untracked.contains(id)
    }

    /// Policies and untracked identities, read together.
    pub fn decisions(&self) -> Decisions {
        let inner = self.read();
        Decisions {
            policies: inner.policies.clone(),
            untracked: inner.untracked.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.read().policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().policies.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Load a registry from a JSON policy file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        let file: PolicyFile = serde_json::from_slice(&data)?;

        let registry = Self::new();
        for (id, policy) in file.policies {
            registry.track_peer(id, policy.alias, policy.scope);
        }
        {
            let mut guard = registry.write();
            let inner = &mut *guard;
            inner.untracked = file
                .untracked
                .into_iter()
                .filter(|id| !inner.policies.contains_key(id))
                .collect();
        }
        Ok(registry)
    }

    /// Write every policy to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let Decisions { policies, untracked } = self.decisions();
        let file = PolicyFile {
            version: FILE_VERSION,
            policies,
            untracked,
        };
        let json = serde_json::to_vec_pretty(&file)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
