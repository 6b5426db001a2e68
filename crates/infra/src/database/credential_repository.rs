//! SQLite-backed implementation of the CredentialRepository port.

use std::sync::Arc;

use async_trait::async_trait;
use calsync_core::CredentialRepository;
use calsync_domain::{CalsyncError, CredentialRecord, Result};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use tracing::{debug, instrument};

use super::pool::DbPool;
use crate::errors::InfraError;

/// SQLite implementation of CredentialRepository.
pub struct SqliteCredentialRepository {
    pool: Arc<DbPool>,
}

impl SqliteCredentialRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

/// Raw row shape; timestamps are converted outside the rusqlite closure.
struct CredentialRow {
    user_id: i64,
    provider: String,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    updated_at: i64,
}

fn row_to_record(row: CredentialRow) -> Result<CredentialRecord> {
    Ok(CredentialRecord {
        user_id: row.user_id,
        provider: row.provider,
        access_token: row.access_token,
        refresh_token: row.refresh_token,
        expires_at: row.expires_at.map(from_epoch).transpose()?,
        updated_at: from_epoch(row.updated_at)?,
    })
}

fn from_epoch(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| CalsyncError::Database(format!("invalid stored timestamp: {secs}")))
}

#[async_trait]
impl CredentialRepository for SqliteCredentialRepository {
    #[instrument(skip(self))]
    async fn find(&self, user_id: i64, provider: &str) -> Result<Option<CredentialRecord>> {
        let conn = self.pool.get()?;

        let row = conn
            .query_row(
                "SELECT user_id, provider, access_token, refresh_token, expires_at, updated_at
                 FROM credentials
                 WHERE user_id = ?1 AND provider = ?2",
                rusqlite::params![user_id, provider],
                |row| {
                    Ok(CredentialRow {
                        user_id: row.get(0)?,
                        provider: row.get(1)?,
                        access_token: row.get(2)?,
                        refresh_token: row.get(3)?,
                        expires_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(InfraError::from)?;

        row.map(row_to_record).transpose()
    }

    #[instrument(skip(self, record), fields(user_id = record.user_id, provider = %record.provider))]
    async fn upsert(&self, record: &CredentialRecord) -> Result<()> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO credentials
                (user_id, provider, access_token, refresh_token, expires_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id, provider) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at",
            rusqlite::params![
                record.user_id,
                record.provider,
                record.access_token,
                record.refresh_token,
                record.expires_at.map(|at| at.timestamp()),
                record.updated_at.timestamp(),
            ],
        )
        .map_err(InfraError::from)?;

        debug!(user_id = record.user_id, provider = %record.provider, "credential upserted");
        Ok(())
    }

    #[instrument(skip(self, access_token))]
    async fn update_access_token(
        &self,
        user_id: i64,
        provider: &str,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.pool.get()?;

        let updated = conn
            .execute(
                "UPDATE credentials
                 SET access_token = ?1, expires_at = ?2, updated_at = ?3
                 WHERE user_id = ?4 AND provider = ?5",
                rusqlite::params![
                    access_token,
                    expires_at.timestamp(),
                    Utc::now().timestamp(),
                    user_id,
                    provider,
                ],
            )
            .map_err(InfraError::from)?;

        if updated == 0 {
            return Err(CalsyncError::NotFound(format!(
                "no credential row for user {user_id} provider {provider}"
            )));
        }

        debug!(user_id, provider, "access token updated");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, user_id: i64, provider: &str) -> Result<()> {
        let conn = self.pool.get()?;

        conn.execute(
            "DELETE FROM credentials WHERE user_id = ?1 AND provider = ?2",
            rusqlite::params![user_id, provider],
        )
        .map_err(InfraError::from)?;

        debug!(user_id, provider, "credential deleted");
        Ok(())
    }
}
