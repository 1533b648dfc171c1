//! # Peerforge Core
//!
//! Pure primitives for Peerforge: identities, object ids, the namespace ref
//! layout, and signed ref manifests.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`PeerId`] - An identity; the Ed25519 public key owning a namespace
//! - [`Keypair`] - The local signing key
//! - [`Oid`] - An object id in the version-control engine
//! - [`RefName`] - A ref inside a namespace (`refs/heads/*`, `refs/rad/*`, `refs/patches/*`)
//! - [`Manifest`] / [`SignedManifest`] - Sequenced, signed snapshots of a namespace
//!
//! ## Usage
//!
//! ```rust
//! use peerforge_core::{Keypair, Manifest, Oid, RefName, RepoId, SignedManifest};
//!
//! let keypair = Keypair::generate();
//! let repo = RepoId::derive(b"my-project");
//! let signed = Manifest::new(repo, keypair.peer_id(), 1)
//!     .with_ref(RefName::head("main").unwrap(), Oid::from_bytes([1; 20]))
//!     .sign(&keypair)
//!     .unwrap();
//!
//! let bytes = signed.encode().unwrap();
//! let received = SignedManifest::decode(&bytes).unwrap();
//! received.verify().unwrap();
//! ```

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod refs;
pub mod sigrefs;
pub mod types;

pub use crypto::{Blake3Hash, Keypair, PeerId, Signature};
pub use error::{CoreError, Result};
pub use refs::{BranchName, NamespacedRef, RefName};
pub use sigrefs::{Manifest, SignedManifest};
pub use types::{now_millis, Oid, RepoId};
