//! Transport abstraction for the sync protocol.
//!
//! The transport handles delivery of single request/response exchanges.
//! Implementations may use TCP, QUIC, or any other transport.

use async_trait::async_trait;
use bytes::Bytes;

use peerforge_core::{PeerId, RepoId};

use crate::error::{Result, SyncError};
use crate::messages::{Address, Request, Response};

/// Transport trait for talking to peers.
///
/// Implementations must be thread-safe (Send + Sync). Only `connect` and
/// `request` are required; the typed calls build on `request` and check the
/// response shape and limits.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Establish (or confirm) a connection to `peer`.
    ///
    /// Fails with [`SyncError::Connection`] if the peer cannot be reached.
    async fn connect(&self, peer: &Address) -> Result<()>;

    /// Send one request and wait for its response.
    async fn request(&self, peer: &Address, request: Request) -> Result<Response>;

    /// Identities the peer holds for `repo`.
    async fn list_namespaces(&self, peer: &Address, repo: &RepoId) -> Result<Vec<PeerId>> {
        match checked(self.request(peer, Request::Namespaces { repo: *repo }).await?)? {
            Response::Namespaces { identities } => Ok(identities),
            other => Err(unexpected("Namespaces", &other)),
        }
    }

    /// The peer's encoded manifest for `identity`, if it has one.
    async fn request_manifest(
        &self,
        peer: &Address,
        repo: &RepoId,
        identity: &PeerId,
    ) -> Result<Option<Bytes>> {
        let request = Request::Manifest {
            repo: *repo,
            identity: *identity,
        };
        match checked(self.request(peer, request).await?)? {
            Response::Manifest { manifest } => Ok(manifest),
            other => Err(unexpected("Manifest", &other)),
        }
    }

    /// Offer an encoded manifest; returns the sequence the peer accepted.
    async fn push_manifest(
        &self,
        peer: &Address,
        repo: &RepoId,
        identity: &PeerId,
        manifest: Bytes,
    ) -> Result<u64> {
        let request = Request::Push {
            repo: *repo,
            identity: *identity,
            manifest,
        };
        match checked(self.request(peer, request).await?)? {
            Response::Accepted { sequence } => Ok(sequence),
            other => Err(unexpected("Accepted", &other)),
        }
    }
}

fn checked(response: Response) -> Result<Response> {
    response
        .validate_limits()
        .map_err(|reason| SyncError::InvalidMessage(reason.into()))?;
    match response {
        Response::Error { code, message } => Err(SyncError::Rejected { code, message }),
        other => Ok(other),
    }
}

fn unexpected(expected: &str, got: &Response) -> SyncError {
    SyncError::InvalidMessage(format!(
        "expected {expected}, got {:?}",
        std::mem::discriminant(got)
    ))
}

/// An in-memory network for tests and single-process simulations.
///
/// Each registered address is backed by a [`Service`](crate::serve::Service),
/// typically a peer's namespace store.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::RwLock;

    use crate::serve::Service;

    struct Node {
        service: Arc<dyn Service>,
        latency: Duration,
        reachable: bool,
    }

    /// Shared state for the memory transport network.
    #[derive(Default)]
    pub struct MemoryNetwork {
        nodes: RwLock<HashMap<Address, Node>>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Serve `service` at `address`, replacing any previous registration.
        pub async fn register(&self, address: impl Into<Address>, service: Arc<dyn Service>) {
            self.nodes.write().await.insert(
                address.into(),
                Node {
                    service,
                    latency: Duration::ZERO,
                    reachable: true,
                },
            );
        }

        /// Delay applied to every exchange with `address`.
        pub async fn set_latency(&self, address: &Address, latency: Duration) {
            if let Some(node) = self.nodes.write().await.get_mut(address) {
                node.latency = latency;
            }
        }

        pub async fn set_reachable(&self, address: &Address, reachable: bool) {
            if let Some(node) = self.nodes.write().await.get_mut(address) {
                node.reachable = reachable;
            }
        }

        /// Create a transport connected to this network.
        pub fn transport(self: &Arc<Self>) -> MemoryTransport {
            MemoryTransport {
                network: Arc::clone(self),
            }
        }

        async fn route(&self, peer: &Address) -> Option<(Arc<dyn Service>, Duration)> {
            let nodes = self.nodes.read().await;
            nodes
                .get(peer)
                .filter(|node| node.reachable)
                .map(|node| (Arc::clone(&node.service), node.latency))
        }
    }

    /// In-memory transport implementation.
    #[derive(Clone)]
    pub struct MemoryTransport {
        network: Arc<MemoryNetwork>,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn connect(&self, peer: &Address) -> Result<()> {
            let (_, latency) =
                self.network
                    .route(peer)
                    .await
                    .ok_or_else(|| SyncError::Connection {
                        peer: peer.clone(),
                        reason: "peer not reachable".into(),
                    })?;
            tokio::time::sleep(latency).await;
            Ok(())
        }

        async fn request(&self, peer: &Address, request: Request) -> Result<Response> {
            let (service, latency) = self
                .network
                .route(peer)
                .await
                .ok_or_else(|| SyncError::Transport(format!("{peer} went away")))?;
            tokio::time::sleep(latency).await;
            Ok(service.handle(request).await)
        }
    }
}
