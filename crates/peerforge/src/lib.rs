//! # Peerforge
//!
//! A decentralized collaboration layer on top of a version-control engine.
//! Peers exchange signed, identity-scoped snapshots of their refs, and
//! patches are negotiated without a central server.
//!
//! ## Overview
//!
//! - **Namespaces**: every identity owns `<identity>/refs/...`, published as
//!   a signed, sequenced manifest
//! - **Tracking**: local policy decides whose namespaces are fetched
//! - **Sync**: fetch from peers, announce to seeds
//! - **Patches**: lifecycle derived from change records and branch heads
//! - **Remotes**: local names for other identities' namespaces
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use peerforge::{Node, NodeConfig};
//! use peerforge::core::{Keypair, Oid, RepoId};
//! use peerforge::patch::{MemoryGraph, Status};
//! use peerforge::store::NamespaceStore;
//! use peerforge::sync::memory::MemoryNetwork;
//!
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let network = MemoryNetwork::new();
//! let node: Node = Node::new(
//!     Keypair::generate(),
//!     NamespaceStore::memory(),
//!     network.transport(),
//!     Arc::new(MemoryGraph::new()),
//!     NodeConfig::default(),
//! );
//!
//! let repo = RepoId::derive(b"my-project");
//! let base = Oid::from_bytes([1; 20]);
//! node.set_head(&repo, "main", base).await.unwrap();
//!
//! let id = node
//!     .propose_patch(&repo, "main", "Add CI", base, Oid::from_bytes([2; 20]))
//!     .await
//!     .unwrap();
//! let patch = node.patch(&repo, &id).await.unwrap().unwrap();
//! assert_eq!(patch.status, Status::Proposed);
//! # });
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `peerforge::core` - Identities, object ids, refs, signed manifests
//! - `peerforge::tracking` - Tracking policies and aliases
//! - `peerforge::store` - Namespace store and backends
//! - `peerforge::sync` - Fetch, announce, transports
//! - `peerforge::patch` - Change records and patch reconstruction

pub mod config;
pub mod error;
pub mod node;
pub mod remote;

pub use peerforge_core as core;
pub use peerforge_patch as patch;
pub use peerforge_store as store;
pub use peerforge_sync as sync;
pub use peerforge_tracking as tracking;

pub use config::NodeConfig;
pub use error::{Error, Result};
pub use node::Node;
pub use remote::{fetch_refspec, remote_refs, RemoteBindings};

pub use peerforge_core::{Keypair, Oid, PeerId, RefName, RepoId};
pub use peerforge_patch::{Patch, Status};
pub use peerforge_sync::{Address, FetchReport, Outcome};
pub use peerforge_tracking::Scope;
