//! # Peerforge Patch
//!
//! Patch lifecycle as a read-side projection over stored namespaces.
//!
//! Patches are never stored as state. Their history is a chain of signed
//! [`Change`] records in the version-control engine's object graph, and each
//! namespace points at the latest change it knows of through
//! `refs/patches/<id>`. [`Inspector`] rebuilds a [`Patch`] from a store
//! [`Snapshot`](peerforge_store::Snapshot) on demand.
//!
//! ## Key Types
//!
//! - [`Change`] / [`SignedChange`] - Open, revise, and close records
//! - [`ObjectGraph`] - Ancestry and change lookup; [`MemoryGraph`] for tests
//! - [`Inspector`] - Walks, orders, and replays changes into a [`Patch`]
//! - [`Status`] - `Proposed`, `Updated`, `Merged`, `Closed`
//!
//! ## Usage
//!
//! ```rust
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//! use peerforge_core::{BranchName, Keypair, Manifest, Oid, RefName, RepoId};
//! use peerforge_patch::{Change, Inspector, MemoryGraph, ObjectGraph, Status};
//! use peerforge_store::{Namespace, Snapshot};
//!
//! let alice = Keypair::generate();
//! let graph = MemoryGraph::new();
//! let base = Oid::from_bytes([1; 20]);
//! let head = Oid::from_bytes([2; 20]);
//! graph.add_commit(base, &[]);
//! graph.add_commit(head, &[base]);
//!
//! let open = Change::open(alice.peer_id(), BranchName::new("main").unwrap(), "Fix typo", base, head, 0)
//!     .sign(&alice)
//!     .unwrap();
//! let id = graph.insert_change(open).unwrap();
//!
//! let repo = RepoId::derive(b"my-project");
//! let signed = Manifest::new(repo, alice.peer_id(), 1)
//!     .with_ref(RefName::head("main").unwrap(), base)
//!     .with_ref(RefName::Patch(id), id)
//!     .sign(&alice)
//!     .unwrap();
//! let namespace = Arc::new(Namespace::new(signed, 0).unwrap());
//! let snapshot = Snapshot::new(repo, [(alice.peer_id(), namespace)].into_iter().collect());
//!
//! let delegates = BTreeSet::new();
//! let patch = Inspector::new(&graph, &delegates)
//!     .inspect(&snapshot, &id)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(patch.status, Status::Proposed);
//! ```

pub mod change;
pub mod error;
pub mod graph;
pub mod inspect;
pub mod patch;

pub use change::{Action, Change, SignedChange};
pub use error::{PatchError, Result};
pub use graph::{MemoryGraph, ObjectGraph};
pub use inspect::{patch_ids, Inspector, MAX_CHANGES};
pub use patch::{Patch, Resolution, Revision, Status};
