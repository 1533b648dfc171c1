//! # Peerforge Testkit
//!
//! Testing utilities for Peerforge.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: deterministic peers, abbreviated object ids, and a
//!   [`TestNetwork`] of nodes on one in-memory network
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! ```rust
//! use peerforge_testkit::fixtures::{oid, repo, TestPeer};
//!
//! let alice = TestPeer::with_seed(1);
//! let signed = alice.main_at(repo("heartwood"), 1, oid("3e674d1"));
//! signed.verify().unwrap();
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use peerforge_testkit::generators::ref_name;
//!
//! proptest! {
//!     #[test]
//!     fn ref_names_round_trip(name in ref_name()) {
//!         prop_assert_eq!(name.to_string().parse::<RefName>().unwrap(), name);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{oid, repo, TestNetwork, TestPeer};
