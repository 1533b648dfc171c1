//! # Peerforge Store
//!
//! Identity-scoped, signed ref storage. One current snapshot per
//! `(repository, identity)`, replaced atomically and only by a correctly
//! signed manifest with a higher sequence number.
//!
//! ## Key Types
//!
//! - [`NamespaceStore`] - Acceptance rules, per-identity writer locks, snapshots
//! - [`Backend`] - The persistence seam
//! - [`MemoryBackend`] - In-memory backend for tests and ephemeral nodes
//! - [`SqliteBackend`] - SQLite-based persistent backend
//! - [`Namespace`] - An accepted, immutable namespace snapshot
//! - [`Snapshot`] - Copy-on-write view of a whole repository
//!
//! ## Usage
//!
//! ```rust,no_run
//! use peerforge_core::{Keypair, Manifest, Oid, RefName, RepoId};
//! use peerforge_store::{NamespaceStore, SqliteBackend};
//!
//! async fn example() {
//!     let store = NamespaceStore::new(SqliteBackend::open("peerforge.db").unwrap());
//!     let keypair = Keypair::generate();
//!     let repo = RepoId::derive(b"my-project");
//!
//!     let signed = Manifest::new(repo, keypair.peer_id(), 1)
//!         .with_ref(RefName::head("main").unwrap(), Oid::from_bytes([1; 20]))
//!         .sign(&keypair)
//!         .unwrap();
//!     store
//!         .put(&repo, &keypair.peer_id(), signed.manifest, signed.signature)
//!         .await
//!         .unwrap();
//!
//!     let ns = store.get(&repo, &keypair.peer_id()).await.unwrap();
//!     assert_eq!(ns.sequence(), 1);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **No retries**: `put` fails fast; callers decide whether to retry
//! - **No global lock**: writers to different identities never contend
//! - **Cancellation**: dropping a `put` future after the write started never
//!   rolls the write back

pub mod backend;
pub mod error;
pub mod memory;
pub mod migration;
pub mod namespace;
pub mod sqlite;
pub mod store;

pub use backend::Backend;
pub use error::{Result, StoreError};
pub use memory::MemoryBackend;
pub use namespace::{Namespace, Namespaces, Snapshot};
pub use sqlite::SqliteBackend;
pub use store::{NamespaceStore, Replaced};
