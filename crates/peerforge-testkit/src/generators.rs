//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;

use peerforge::Scope;
use peerforge_core::{BranchName, Keypair, Manifest, Oid, PeerId, RefName, RepoId};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a valid identity.
pub fn peer_id() -> impl Strategy<Value = PeerId> {
    keypair().prop_map(|kp| kp.peer_id())
}

pub fn oid() -> impl Strategy<Value = Oid> {
    any::<[u8; 20]>().prop_map(Oid::from_bytes)
}

pub fn repo_id() -> impl Strategy<Value = RepoId> {
    any::<[u8; 32]>().prop_map(RepoId::from_bytes)
}

/// Branch names of one or two components.
pub fn branch_name() -> impl Strategy<Value = BranchName> {
    "[a-z][a-z0-9-]{0,15}(/[a-z][a-z0-9-]{0,15})?".prop_filter_map("valid branch", |s| {
        BranchName::new(s).ok()
    })
}

/// Any ref that may appear in a manifest (never `refs/rad/sigrefs`).
pub fn ref_name() -> impl Strategy<Value = RefName> {
    prop_oneof![
        4 => branch_name().prop_map(RefName::Head),
        1 => Just(RefName::RadId),
        2 => oid().prop_map(RefName::Patch),
    ]
}

pub fn refs(max: usize) -> impl Strategy<Value = BTreeMap<RefName, Oid>> {
    prop::collection::btree_map(ref_name(), oid(), 0..=max)
}

/// An unsigned manifest owned by `keypair`'s identity.
pub fn manifest_for(keypair: &Keypair, repo: RepoId) -> impl Strategy<Value = Manifest> {
    let identity = keypair.peer_id();
    (1u64..=1_000_000, refs(16)).prop_map(move |(sequence, refs)| Manifest {
        repo,
        identity,
        sequence,
        refs,
    })
}

pub fn scope() -> impl Strategy<Value = Scope> {
    prop_oneof![Just(Scope::None), Just(Scope::Trusted), Just(Scope::All)]
}

/// Strings that pass alias validation.
pub fn alias() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,31}"
}
