//! SQLite schema migrations.
//!
//! Migrations are applied in order inside one transaction; the number of
//! applied steps is kept in `PRAGMA user_version`.

use rusqlite::Connection;
use tracing::debug;

use crate::error::{Result, StoreError};

/// Schema steps, oldest first. Step `i` moves the schema to version `i + 1`.
const MIGRATIONS: &[&str] = &[
    // v1: one row per (repository, identity), holding the accepted manifest.
    r#"
    CREATE TABLE namespaces (
        repo BLOB NOT NULL,            -- 32 bytes
        identity BLOB NOT NULL,        -- 32 bytes, Ed25519 public key
        sequence INTEGER NOT NULL,
        manifest BLOB NOT NULL,        -- wire-encoded signed manifest
        sigrefs BLOB NOT NULL,         -- 20 bytes, object id of the manifest
        received_at INTEGER NOT NULL,  -- Unix ms
        PRIMARY KEY (repo, identity)
    );
    CREATE INDEX idx_namespaces_received ON namespaces(received_at);
    "#,
];

/// Schema version written by this build.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

/// Bring the schema up to [`CURRENT_VERSION`]. Safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let found: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if found > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{found} is newer than supported v{CURRENT_VERSION}"
        )));
    }
    if found == CURRENT_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (step, sql) in MIGRATIONS.iter().enumerate().skip(found as usize) {
        tx.execute_batch(sql)
            .map_err(|e| StoreError::Migration(format!("v{}: {e}", step + 1)))?;
    }
    tx.pragma_update(None, "user_version", CURRENT_VERSION)?;
    tx.commit()?;

    debug!(from = found, to = CURRENT_VERSION, "schema migrated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(conn: &Connection) -> u32 {
        conn.pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_fresh_database_gets_namespaces_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let count: u32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'namespaces'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(version(&conn), CURRENT_VERSION);
    }

    #[test]
    fn test_reopening_is_a_no_op() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        assert_eq!(version(&conn), CURRENT_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", 99).unwrap();
        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
