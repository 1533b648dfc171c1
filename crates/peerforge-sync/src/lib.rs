//! # Peerforge Sync
//!
//! Replication of signed namespaces between peers.
//!
//! ## Protocol
//!
//! Every exchange is one request and one response:
//!
//! 1. `Namespaces { repo }` lists the identities a peer holds
//! 2. `Manifest { repo, identity }` returns one encoded signed manifest
//! 3. `Push { repo, identity, manifest }` offers a manifest to a seed
//!
//! Received manifests are applied through [`NamespaceStore::put`], so the
//! signature and sequence checks are the same for fetched, pushed, and
//! locally authored data.
//!
//! ## Key Types
//!
//! - [`Fetcher`] - Pulls tracked namespaces from one or many peers
//! - [`Announcer`] - Pushes the local namespace to seeds with retry
//! - [`Transport`] - The network seam; [`memory::MemoryNetwork`] for tests
//! - [`FetchReport`] / [`AnnounceReport`] - Per-identity and per-seed results
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use peerforge_core::{Keypair, Manifest, Oid, RefName, RepoId};
//! use peerforge_store::NamespaceStore;
//! use peerforge_sync::{memory::MemoryNetwork, Address, Fetcher, SyncConfig};
//! use peerforge_tracking::{Scope, TrackingRegistry};
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let repo = RepoId::derive(b"my-project");
//! let alice = Keypair::generate();
//! let network = MemoryNetwork::new();
//!
//! let remote = Arc::new(NamespaceStore::memory());
//! let signed = Manifest::new(repo, alice.peer_id(), 1)
//!     .with_ref(RefName::head("main").unwrap(), Oid::from_bytes([1; 20]))
//!     .sign(&alice)
//!     .unwrap();
//! remote.put_signed(&repo, signed).await.unwrap();
//! network.register("alice", remote).await;
//!
//! let registry = Arc::new(TrackingRegistry::new());
//! registry.track_peer(alice.peer_id(), None, Scope::Trusted);
//!
//! let fetcher = Fetcher::new(
//!     Keypair::generate().peer_id(),
//!     Arc::new(NamespaceStore::memory()),
//!     registry,
//!     Arc::new(network.transport()),
//!     SyncConfig::default(),
//! );
//! let report = fetcher
//!     .fetch(&repo, &Address::from("alice"), Scope::Trusted)
//!     .await
//!     .unwrap();
//! assert_eq!(report.applied_count(), 1);
//! # });
//! # }
//! ```
//!
//! [`NamespaceStore::put`]: peerforge_store::NamespaceStore::put

pub mod announce;
pub mod backoff;
pub mod config;
pub mod error;
pub mod fetch;
pub mod messages;
pub mod serve;
pub mod transport;

pub use announce::{AnnounceOutcome, AnnounceReport, Announcer};
pub use backoff::BackoffPolicy;
pub use config::{AnnounceConfig, SyncConfig};
pub use error::{Result, SyncError};
pub use fetch::{FailReason, FetchReport, Fetcher, Outcome, RefUpdate, SkipReason};
pub use messages::{Address, ErrorCode, Request, Response, PROTOCOL_VERSION};
pub use serve::{respond, Service};
pub use transport::{memory, Transport};
