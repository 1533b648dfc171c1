//! SQLite backend.
//!
//! The persistent backend for Peerforge. Uses rusqlite with bundled SQLite,
//! wrapped in async via `tokio::task::spawn_blocking`. Manifests are stored in
//! their wire encoding and decoded on load.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use peerforge_core::{PeerId, RepoId, SignedManifest};

use crate::backend::Backend;
use crate::error::{Result, StoreError};
use crate::migration;
use crate::namespace::Namespace;

/// SQLite-based backend.
///
/// Thread-safe via an internal Mutex; the namespace store above it already
/// serializes writers per identity.
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open a SQLite database at the given path, creating and migrating it
    /// as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {e}")),
                ))
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn row_to_namespace(manifest: Vec<u8>, received_at: i64) -> Result<Namespace> {
    let signed = SignedManifest::decode(&manifest)
        .map_err(|e| StoreError::InvalidData(format!("stored manifest: {e}")))?;
    Namespace::new(signed, received_at).map_err(|e| StoreError::InvalidData(e.to_string()))
}

fn blob_to_peer(bytes: Vec<u8>) -> Result<PeerId> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| StoreError::InvalidData("identity column is not 32 bytes".into()))?;
    Ok(PeerId::from_bytes(arr))
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn load(&self, repo: &RepoId, identity: &PeerId) -> Result<Option<Arc<Namespace>>> {
        let (repo, identity) = (*repo, *identity);
        self.blocking(move |conn| {
            let row: Option<(Vec<u8>, i64)> = conn
                .query_row(
                    "SELECT manifest, received_at FROM namespaces
                     WHERE repo = ?1 AND identity = ?2",
                    params![repo.as_bytes().as_slice(), identity.as_bytes().as_slice()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            row.map(|(manifest, received_at)| row_to_namespace(manifest, received_at).map(Arc::new))
                .transpose()
        })
        .await
    }

    async fn save(&self, namespace: Arc<Namespace>) -> Result<()> {
        let manifest = namespace
            .signed()
            .encode()
            .map_err(|e| StoreError::MalformedManifest(e.to_string()))?;

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO namespaces (repo, identity, sequence, manifest, sigrefs, received_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(repo, identity) DO UPDATE SET
                    sequence = excluded.sequence,
                    manifest = excluded.manifest,
                    sigrefs = excluded.sigrefs,
                    received_at = excluded.received_at",
                params![
                    namespace.repo().as_bytes().as_slice(),
                    namespace.identity().as_bytes().as_slice(),
                    namespace.sequence() as i64,
                    manifest,
                    namespace.sigrefs().as_bytes().as_slice(),
                    namespace.received_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn identities(&self, repo: &RepoId) -> Result<Vec<PeerId>> {
        let repo = *repo;
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT identity FROM namespaces WHERE repo = ?1 ORDER BY identity",
            )?;
            let rows = stmt.query_map(params![repo.as_bytes().as_slice()], |row| {
                row.get::<_, Vec<u8>>(0)
            })?;

            let mut ids = Vec::new();
            for row in rows {
                ids.push(blob_to_peer(row?)?);
            }
            Ok(ids)
        })
        .await
    }

    async fn load_all(&self, repo: &RepoId) -> Result<BTreeMap<PeerId, Arc<Namespace>>> {
        let repo = *repo;
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT identity, manifest, received_at FROM namespaces WHERE repo = ?1",
            )?;
            let rows = stmt.query_map(params![repo.as_bytes().as_slice()], |row| {
                Ok((
                    row.get::<_, Vec<u8>>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?;

            let mut namespaces = BTreeMap::new();
            for row in rows {
                let (identity, manifest, received_at) = row?;
                namespaces.insert(
                    blob_to_peer(identity)?,
                    Arc::new(row_to_namespace(manifest, received_at)?),
                );
            }
            Ok(namespaces)
        })
        .await
    }

    async fn repositories(&self) -> Result<Vec<RepoId>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare("SELECT DISTINCT repo FROM namespaces ORDER BY repo")?;
            let rows = stmt.query_map([], |row| row.get::<_, Vec<u8>>(0))?;

            let mut repos = Vec::new();
            for row in rows {
                let arr: [u8; 32] = row?
                    .try_into()
                    .map_err(|_| StoreError::InvalidData("repo column is not 32 bytes".into()))?;
                repos.push(RepoId::from_bytes(arr));
            }
            Ok(repos)
        })
        .await
    }
}
