//! SQLite-backed implementation of the UserRepository port.
//!
//! The account subsystem proper is out of scope; this narrow adapter
//! exists so the token and calendar services can resolve accounts against
//! the same database in development and integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use calsync_core::UserRepository;
use calsync_domain::{Result, User};
use rusqlite::OptionalExtension;
use tracing::instrument;

use super::pool::DbPool;
use crate::errors::InfraError;

/// SQLite implementation of UserRepository.
pub struct SqliteUserRepository {
    pool: Arc<DbPool>,
}

impl SqliteUserRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.pool.get()?;

        let user = conn
            .query_row(
                "SELECT id, email FROM users WHERE id = ?1",
                rusqlite::params![id],
                |row| Ok(User { id: row.get(0)?, email: row.get(1)? }),
            )
            .optional()
            .map_err(InfraError::from)?;

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.pool.get()?;

        let user = conn
            .query_row(
                "SELECT id, email FROM users WHERE email = ?1",
                rusqlite::params![email],
                |row| Ok(User { id: row.get(0)?, email: row.get(1)? }),
            )
            .optional()
            .map_err(InfraError::from)?;

        Ok(user)
    }
}
