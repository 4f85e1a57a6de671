//! SQLite store utilities.
//!
//! Connections are opened with:
//! - `journal_mode = WAL` so `kf` readers never block a concurrent writer
//! - a busy timeout (5 s unless the project config says otherwise)
//! - `foreign_keys = ON` so ties cannot point at missing people

pub mod migrations;
pub mod query;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::{path::Path, time::Duration};
use tracing::debug;

/// Busy timeout used when no project config overrides it.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// File name of the store inside `.kinfold/`.
pub const STORE_FILE: &str = "kinfold.db";

/// Open (or create) the store with the default busy timeout.
///
/// # Errors
///
/// Returns an error if opening, configuring or migrating the database fails.
pub fn open_store(path: &Path) -> Result<Connection> {
    open_store_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
}

/// Open (or create) the store, apply runtime pragmas and migrate the schema
/// to the latest version.
///
/// # Errors
///
/// Returns an error if opening, configuring or migrating the database fails.
pub fn open_store_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create store directory {}", parent.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open store {}", path.display()))?;

    configure_connection(&conn, busy_timeout).context("configure sqlite pragmas")?;
    let version = migrations::migrate(&mut conn).context("apply store migrations")?;
    debug!(path = %path.display(), version, "opened store");

    Ok(conn)
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BUSY_TIMEOUT, open_store, open_store_with_timeout};
    use crate::db::migrations;
    use std::time::Duration;
    use tempfile::TempDir;

    fn temp_db_path() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(".kinfold").join("kinfold.db");
        (dir, path)
    }

    #[test]
    fn open_store_sets_wal_busy_timeout_and_fk() {
        let (_dir, path) = temp_db_path();
        let conn = open_store(&path).expect("open store");

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(u128::from(busy_timeout_ms), DEFAULT_BUSY_TIMEOUT.as_millis());

        let foreign_keys: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("query foreign_keys");
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn configured_busy_timeout_is_applied() {
        let (_dir, path) = temp_db_path();
        let conn = open_store_with_timeout(&path, Duration::from_millis(250)).expect("open store");
        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(busy_timeout_ms, 250);
    }

    #[test]
    fn open_store_runs_migrations_and_reopens() {
        let (_dir, path) = temp_db_path();
        let conn = open_store(&path).expect("open store");
        let version = migrations::current_schema_version(&conn).expect("schema version query");
        assert_eq!(version, migrations::LATEST_SCHEMA_VERSION);
        drop(conn);

        let conn = open_store(&path).expect("reopen store");
        let stored: i64 = conn
            .query_row(
                "SELECT schema_version FROM store_meta WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .expect("store_meta schema version");
        assert_eq!(stored, i64::from(migrations::LATEST_SCHEMA_VERSION));
    }
}
