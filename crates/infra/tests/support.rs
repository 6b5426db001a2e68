//! Shared helpers for infra integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use calsync_domain::{ProviderRegistry, ProviderSettings};
use calsync_infra::database::DbPool;
use once_cell::sync::Lazy;
use tempfile::TempDir;

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
});

/// Install a test tracing subscriber once per process.
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Temporary database wrapper that keeps the underlying file alive for
/// the duration of a test.
pub struct TestDatabase {
    pub pool: Arc<DbPool>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a migrated temporary database.
    pub fn new() -> Self {
        init_tracing();
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("test.db");

        let pool = DbPool::new(&db_path).expect("db pool should be created");
        pool.run_migrations().expect("migrations should apply");

        Self { pool: Arc::new(pool), _temp_dir: temp_dir }
    }

    /// Insert an account row and return its id.
    pub fn insert_user(&self, email: &str) -> i64 {
        let conn = self.pool.get().expect("connection should be available");
        conn.execute("INSERT INTO users (email) VALUES (?1)", rusqlite::params![email])
            .expect("user insert should succeed");
        conn.last_insert_rowid()
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with a single Google provider pointed at a mock token
/// endpoint.
pub fn registry_for(token_endpoint: &str) -> ProviderRegistry {
    let mut settings =
        ProviderSettings::google("test-client", "test-secret", "http://localhost:8080/callback");
    settings.token_endpoint = token_endpoint.to_string();

    let mut registry = ProviderRegistry::new();
    registry.register(settings);
    registry
}
