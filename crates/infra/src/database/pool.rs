//! r2d2-backed SQLite connection pool and schema bootstrap.

use std::path::Path;

use calsync_domain::Result;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::errors::InfraError;

/// A pooled SQLite connection.
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS credentials (
    user_id INTEGER NOT NULL,
    provider TEXT NOT NULL,
    access_token TEXT,
    refresh_token TEXT,
    expires_at INTEGER,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, provider)
);

CREATE TABLE IF NOT EXISTS event_mirrors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    event_date TEXT NOT NULL,
    event_time TEXT,
    event_type TEXT NOT NULL,
    is_important INTEGER NOT NULL DEFAULT 0,
    is_completed INTEGER NOT NULL DEFAULT 0,
    remote_event_id TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_event_mirrors_user_date
    ON event_mirrors(user_id, event_date);

CREATE UNIQUE INDEX IF NOT EXISTS idx_event_mirrors_user_remote
    ON event_mirrors(user_id, remote_event_id)
    WHERE remote_event_id IS NOT NULL;
";

/// Shared connection pool over one SQLite database file.
pub struct DbPool {
    pool: Pool<SqliteConnectionManager>,
}

impl DbPool {
    /// Open (creating if necessary) the database at `path`.
    ///
    /// # Errors
    /// Returns `Database` when the pool cannot be built.
    pub fn new(path: &Path) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
        });
        let pool = Pool::builder().max_size(8).build(manager).map_err(InfraError::from)?;
        Ok(Self { pool })
    }

    /// Check out a connection.
    ///
    /// # Errors
    /// Returns `Database` when the pool is exhausted or broken.
    pub fn get(&self) -> Result<DbConnection> {
        Ok(self.pool.get().map_err(InfraError::from)?)
    }

    /// Apply the schema. Idempotent.
    ///
    /// # Errors
    /// Returns `Database` on DDL failure.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get()?;
        conn.execute_batch(SCHEMA).map_err(InfraError::from)?;
        info!("database schema applied");
        Ok(())
    }
}
