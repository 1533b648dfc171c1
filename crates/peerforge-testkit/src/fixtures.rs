//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use peerforge::{Node, NodeConfig};
use peerforge_core::{Keypair, Manifest, Oid, PeerId, RefName, RepoId, SignedManifest};
use peerforge_patch::MemoryGraph;
use peerforge_store::NamespaceStore;
use peerforge_sync::memory::MemoryNetwork;
use peerforge_sync::Address;

/// An object id from an abbreviated hex prefix, zero-padded to full length.
///
/// `oid("3e674d1").short() == "3e674d1"`.
///
/// # Panics
///
/// If `prefix` is not hex or longer than 40 characters.
pub fn oid(prefix: &str) -> Oid {
    assert!(prefix.len() <= 40, "oid prefix too long: {prefix}");
    let full = format!("{prefix:0<40}");
    Oid::from_hex(&full).unwrap_or_else(|e| panic!("bad oid prefix {prefix:?}: {e}"))
}

/// A repository id derived from a name.
pub fn repo(name: &str) -> RepoId {
    RepoId::derive(name.as_bytes())
}

/// A deterministic identity for signing fixtures by hand.
pub struct TestPeer {
    pub keypair: Keypair,
}

impl TestPeer {
    pub fn new() -> Self {
        Self {
            keypair: Keypair::generate(),
        }
    }

    pub fn with_seed(seed: u8) -> Self {
        Self {
            keypair: Keypair::from_seed(&[seed; 32]),
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.keypair.peer_id()
    }

    /// A signed manifest for this peer's namespace.
    pub fn manifest(&self, repo: RepoId, sequence: u64, refs: &[(RefName, Oid)]) -> SignedManifest {
        let mut manifest = Manifest::new(repo, self.peer_id(), sequence);
        for (name, oid) in refs {
            manifest = manifest.with_ref(name.clone(), *oid);
        }
        manifest
            .sign(&self.keypair)
            .unwrap_or_else(|e| panic!("fixture manifest failed to sign: {e}"))
    }

    /// A manifest with a single `refs/heads/main`.
    pub fn main_at(&self, repo: RepoId, sequence: u64, head: Oid) -> SignedManifest {
        let main = RefName::head("main").unwrap_or_else(|e| panic!("{e}"));
        self.manifest(repo, sequence, &[(main, head)])
    }
}

impl Default for TestPeer {
    fn default() -> Self {
        Self::new()
    }
}

/// Several nodes on one in-memory network, sharing one object graph.
///
/// Object transfer is the engine's job; a shared graph stands in for it.
pub struct TestNetwork {
    pub network: Arc<MemoryNetwork>,
    pub graph: Arc<MemoryGraph>,
}

impl TestNetwork {
    pub fn new() -> Self {
        Self {
            network: MemoryNetwork::new(),
            graph: Arc::new(MemoryGraph::new()),
        }
    }

    /// Start a node with a deterministic key, reachable at `name`.
    pub async fn node(&self, name: &str, seed: u8) -> Node {
        self.node_with_config(name, seed, NodeConfig::default()).await
    }

    pub async fn node_with_config(&self, name: &str, seed: u8, config: NodeConfig) -> Node {
        let node = Node::new(
            Keypair::from_seed(&[seed; 32]),
            NamespaceStore::memory(),
            self.network.transport(),
            self.graph.clone(),
            config,
        );
        self.network.register(name, node.service()).await;
        node
    }

    /// Record a commit in the shared graph.
    pub fn commit(&self, oid: Oid, parents: &[Oid]) -> Oid {
        self.graph.add_commit(oid, parents);
        oid
    }

    pub fn address(name: &str) -> Address {
        Address::from(name)
    }
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oid_prefix() {
        assert_eq!(oid("3e674d1").short(), "3e674d1");
        assert_eq!(oid("27857ec").to_hex(), format!("27857ec{}", "0".repeat(33)));
        assert_ne!(oid("1"), oid("2"));
    }

    #[test]
    fn test_peer_manifest_verifies() {
        let peer = TestPeer::with_seed(1);
        let signed = peer.main_at(repo("r"), 4, oid("abc"));
        signed.verify().unwrap();
        assert_eq!(signed.sequence(), 4);
    }

    #[tokio::test]
    async fn test_network_nodes_are_registered() {
        let net = TestNetwork::new();
        let node = net.node("alice", 1).await;
        assert_eq!(node.peer_id(), TestPeer::with_seed(1).peer_id());
    }
}
