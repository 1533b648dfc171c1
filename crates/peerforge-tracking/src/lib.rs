//! # Peerforge Tracking
//!
//! The identity and trust registry: which identities a local peer is willing
//! to replicate, and under which scope.
//!
//! ## Key Types
//!
//! - [`TrackingRegistry`] - Thread-safe policy table with alias index
//! - [`TrackingPolicy`] - Scope plus optional alias for one identity
//! - [`Scope`] - `none` (blocked), `trusted`, or `all`
//! - [`Alias`] - Validated human-readable label
//!
//! ## Usage
//!
//! ```rust
//! use peerforge_core::Keypair;
//! use peerforge_tracking::{Scope, TrackingRegistry};
//!
//! let registry = TrackingRegistry::new();
//! let alice = Keypair::generate().peer_id();
//!
//! registry.track(&alice.to_hex(), Some("alice"), Scope::Trusted).unwrap();
//! assert_eq!(registry.resolve("alice").unwrap(), alice);
//!
//! registry.untrack(&alice);
//! assert!(registry.resolve("alice").is_err());
//! ```
//!
//! Untracking only affects future fetches; namespaces already in the store
//! are never purged by the registry.

pub mod alias;
pub mod error;
pub mod policy;
pub mod registry;

pub use alias::Alias;
pub use error::{Result, TrackingError};
pub use policy::{Scope, TrackingPolicy};
pub use registry::{Decisions, TrackingRegistry};
