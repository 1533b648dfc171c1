//! In-memory backend.
//!
//! Same semantics as SQLite with no persistence. Thread-safe via RwLock.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use peerforge_core::{PeerId, RepoId};

use crate::backend::Backend;
use crate::error::Result;
use crate::namespace::Namespace;

type Key = (RepoId, PeerId);

/// In-memory namespace backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    namespaces: RwLock<BTreeMap<Key, Arc<Namespace>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn repo_range(repo: &RepoId) -> RangeInclusive<Key> {
    (*repo, PeerId([0x00; 32]))..=(*repo, PeerId([0xff; 32]))
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn load(&self, repo: &RepoId, identity: &PeerId) -> Result<Option<Arc<Namespace>>> {
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        Ok(namespaces.get(&(*repo, *identity)).cloned())
    }

    async fn save(&self, namespace: Arc<Namespace>) -> Result<()> {
        let key = (*namespace.repo(), *namespace.identity());
        let mut namespaces = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        namespaces.insert(key, namespace);
        Ok(())
    }

    async fn identities(&self, repo: &RepoId) -> Result<Vec<PeerId>> {
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        Ok(namespaces
            .range(repo_range(repo))
            .map(|((_, id), _)| *id)
            .collect())
    }

    async fn load_all(&self, repo: &RepoId) -> Result<BTreeMap<PeerId, Arc<Namespace>>> {
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        Ok(namespaces
            .range(repo_range(repo))
            .map(|((_, id), ns)| (*id, Arc::clone(ns)))
            .collect())
    }

    async fn repositories(&self) -> Result<Vec<RepoId>> {
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        let repos: BTreeSet<RepoId> = namespaces.keys().map(|(repo, _)| *repo).collect();
        Ok(repos.into_iter().collect())
    }
}
