//! Answering sync requests from a local store.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use peerforge_core::SignedManifest;
use peerforge_store::{Backend, NamespaceStore, StoreError};

use crate::messages::{limits, ErrorCode, Request, Response};

/// Something that answers sync requests.
///
/// The in-memory network routes requests to registered services; a real
/// transport would do the same from its listener loop.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    async fn handle(&self, request: Request) -> Response;
}

#[async_trait]
impl<B: Backend> Service for NamespaceStore<B> {
    async fn handle(&self, request: Request) -> Response {
        respond(self, request).await
    }
}

/// Answer one request against `store`.
///
/// Pushes are applied through the same acceptance rules as any other write.
pub async fn respond<B: Backend>(store: &NamespaceStore<B>, request: Request) -> Response {
    if let Err(reason) = request.validate_limits() {
        return Response::error(ErrorCode::LimitExceeded, reason);
    }

    match request {
        Request::Namespaces { repo } => match store.namespaces(&repo).await {
            Ok(identities) => Response::Namespaces {
                identities: identities.take(limits::MAX_NAMESPACES_LISTED).collect(),
            },
            Err(e) => Response::error(ErrorCode::Internal, e),
        },

        Request::Manifest { repo, identity } => match store.try_get(&repo, &identity).await {
            Ok(Some(namespace)) => match namespace.signed().encode() {
                Ok(bytes) => Response::Manifest {
                    manifest: Some(Bytes::from(bytes)),
                },
                Err(e) => Response::error(ErrorCode::Internal, e),
            },
            Ok(None) => Response::Manifest { manifest: None },
            Err(e) => Response::error(ErrorCode::Internal, e),
        },

        Request::Push {
            repo,
            identity,
            manifest,
        } => {
            let signed = match SignedManifest::decode(&manifest) {
                Ok(signed) => signed,
                Err(e) => {
                    warn!(repo = %repo, identity = %identity.short(), "undecodable push: {e}");
                    return Response::error(ErrorCode::Malformed, e);
                }
            };
            match store
                .put(&repo, &identity, signed.manifest, signed.signature)
                .await
            {
                Ok(namespace) => {
                    debug!(repo = %repo, identity = %identity.short(), seq = namespace.sequence(), "accepted push");
                    Response::Accepted {
                        sequence: namespace.sequence(),
                    }
                }
                Err(e) => Response::error(error_code(&e), e),
            }
        }
    }
}

fn error_code(err: &StoreError) -> ErrorCode {
    match err {
        StoreError::StaleManifest { .. } => ErrorCode::Stale,
        StoreError::InvalidSignature { .. } | StoreError::IdentityMismatch { .. } => {
            ErrorCode::InvalidSignature
        }
        StoreError::MalformedManifest(_) => ErrorCode::Malformed,
        StoreError::NotFound { .. } => ErrorCode::NotFound,
        _ => ErrorCode::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerforge_core::{Keypair, Manifest, Oid, RefName, RepoId};

    fn repo() -> RepoId {
        RepoId::derive(b"serve")
    }

    fn push(keypair: &Keypair, seq: u64) -> Request {
        let signed = Manifest::new(repo(), keypair.peer_id(), seq)
            .with_ref(RefName::head("main").unwrap(), Oid::from_bytes([seq as u8; 20]))
            .sign(keypair)
            .unwrap();
        Request::Push {
            repo: repo(),
            identity: keypair.peer_id(),
            manifest: Bytes::from(signed.encode().unwrap()),
        }
    }

    #[tokio::test]
    async fn test_push_then_read_back() {
        let store = NamespaceStore::memory();
        let alice = Keypair::from_seed(&[1; 32]);

        assert_eq!(
            respond(&store, push(&alice, 1)).await,
            Response::Accepted { sequence: 1 }
        );

        let listed = respond(&store, Request::Namespaces { repo: repo() }).await;
        assert_eq!(
            listed,
            Response::Namespaces {
                identities: vec![alice.peer_id()]
            }
        );

        let Response::Manifest {
            manifest: Some(bytes),
        } = respond(
            &store,
            Request::Manifest {
                repo: repo(),
                identity: alice.peer_id(),
            },
        )
        .await
        else {
            panic!("expected a manifest");
        };
        let signed = SignedManifest::decode(&bytes).unwrap();
        assert_eq!(signed.sequence(), 1);
        signed.verify().unwrap();
    }

    #[tokio::test]
    async fn test_push_errors_are_classified() {
        let store = NamespaceStore::memory();
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);

        respond(&store, push(&alice, 2)).await;
        assert!(matches!(
            respond(&store, push(&alice, 1)).await,
            Response::Error {
                code: ErrorCode::Stale,
                ..
            }
        ));

        let Request::Push { manifest, .. } = push(&alice, 3) else {
            unreachable!()
        };
        let forged = Request::Push {
            repo: repo(),
            identity: bob.peer_id(),
            manifest,
        };
        assert!(matches!(
            respond(&store, forged).await,
            Response::Error {
                code: ErrorCode::InvalidSignature,
                ..
            }
        ));

        let garbage = Request::Push {
            repo: repo(),
            identity: alice.peer_id(),
            manifest: Bytes::from_static(&[0u8; 100]),
        };
        assert!(matches!(
            respond(&store, garbage).await,
            Response::Error {
                code: ErrorCode::Malformed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_manifest_is_none() {
        let store = NamespaceStore::memory();
        let response = respond(
            &store,
            Request::Manifest {
                repo: repo(),
                identity: Keypair::from_seed(&[9; 32]).peer_id(),
            },
        )
        .await;
        assert_eq!(response, Response::Manifest { manifest: None });
    }
}
