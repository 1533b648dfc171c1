//! Remote bindings: local names for other identities' namespaces.
//!
//! Binding `alice` to an identity lets the version-control engine see that
//! namespace's branches as `refs/remotes/alice/<branch>`. Bindings only name
//! namespaces; binding and unbinding never touch stored data.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use peerforge_core::refs::check_component;
use peerforge_core::{Oid, PeerId};
use peerforge_store::Namespace;

use crate::error::{Error, Result};

/// Local name to namespace table.
#[derive(Debug, Default)]
pub struct RemoteBindings {
    bindings: RwLock<BTreeMap<String, PeerId>>,
}

impl RemoteBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `identity`'s namespace.
    ///
    /// Rebinding the same pair is a no-op and returns `false`. Fails with
    /// [`Error::NameConflict`] if `name` is bound to another namespace.
    pub fn bind(&self, name: &str, identity: PeerId) -> Result<bool> {
        check_component(name).map_err(|e| Error::InvalidRemoteName {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let mut bindings = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
        match bindings.get(name) {
            Some(bound) if *bound == identity => Ok(false),
            Some(bound) => Err(Error::NameConflict {
                name: name.to_string(),
                bound: *bound,
            }),
            None => {
                bindings.insert(name.to_string(), identity);
                debug!(remote = name, identity = %identity.short(), "remote bound");
                Ok(true)
            }
        }
    }

    /// Remove a binding, returning the identity it named.
    pub fn unbind(&self, name: &str) -> Option<PeerId> {
        let mut bindings = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
        let removed = bindings.remove(name);
        if removed.is_some() {
            debug!(remote = name, "remote unbound");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<PeerId> {
        let bindings = self.bindings.read().unwrap_or_else(PoisonError::into_inner);
        bindings.get(name).copied()
    }

    pub fn bindings(&self) -> BTreeMap<String, PeerId> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// `namespace`'s branch heads as the engine should see them under remote
/// `name`: `refs/remotes/<name>/<branch>`.
pub fn remote_refs(name: &str, namespace: &Namespace) -> BTreeMap<String, Oid> {
    namespace
        .heads()
        .map(|(branch, oid)| (format!("refs/remotes/{name}/{branch}"), oid))
        .collect()
}

/// The refspec that maps `identity`'s branches onto remote `name`.
pub fn fetch_refspec(name: &str, identity: &PeerId) -> String {
    format!("+{identity}/refs/heads/*:refs/remotes/{name}/*")
}
