//! The object graph of the version-control engine.
//!
//! Peerforge never computes diffs or stores commits itself. It asks the
//! engine two things: whether one commit is an ancestor of another, and what
//! change record an object id names.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use peerforge_core::Oid;

use crate::change::SignedChange;
use crate::error::{PatchError, Result};

/// Read and write access to the engine's objects.
pub trait ObjectGraph: Send + Sync {
    /// Whether `ancestor` is reachable from `descendant` (or equal to it).
    ///
    /// Unknown commits are never ancestors.
    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool>;

    /// The change record stored under `oid`, if any.
    fn change(&self, oid: &Oid) -> Result<Option<SignedChange>>;

    /// Store a change record, returning its object id.
    fn insert_change(&self, change: SignedChange) -> Result<Oid>;
}

#[derive(Debug, Default)]
struct Objects {
    commits: HashMap<Oid, Vec<Oid>>,
    changes: HashMap<Oid, SignedChange>,
}

/// In-memory object graph for tests and simulations.
///
/// Several nodes may share one graph; object transfer between peers is the
/// engine's job and is taken as already done.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    objects: RwLock<Objects>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a commit and its parents.
    pub fn add_commit(&self, oid: Oid, parents: &[Oid]) {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        objects.commits.insert(oid, parents.to_vec());
    }

    pub fn has_commit(&self, oid: &Oid) -> bool {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        objects.commits.contains_key(oid)
    }

    pub fn change_count(&self) -> usize {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        objects.changes.len()
    }
}

impl ObjectGraph for MemoryGraph {
    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        if !objects.commits.contains_key(ancestor) {
            return Ok(false);
        }

        let mut seen = HashSet::new();
        let mut stack = vec![*descendant];
        while let Some(oid) = stack.pop() {
            if oid == *ancestor {
                return Ok(true);
            }
            if !seen.insert(oid) {
                continue;
            }
            if let Some(parents) = objects.commits.get(&oid) {
                stack.extend(parents.iter().copied());
            }
        }
        Ok(false)
    }

    fn change(&self, oid: &Oid) -> Result<Option<SignedChange>> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        Ok(objects.changes.get(oid).cloned())
    }

    fn insert_change(&self, change: SignedChange) -> Result<Oid> {
        let oid = change
            .oid()
            .map_err(|e| PatchError::MalformedChange(e.to_string()))?;
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        objects.changes.insert(oid, change);
        Ok(oid)
    }
}
