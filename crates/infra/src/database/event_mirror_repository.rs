//! SQLite-backed implementation of the EventMirrorRepository port.

use std::sync::Arc;

use async_trait::async_trait;
use calsync_core::EventMirrorRepository;
use calsync_domain::{CalsyncError, EventMirror, EventMirrorParams, EventType, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::OptionalExtension;
use tracing::{debug, instrument};

use super::pool::DbPool;
use crate::errors::InfraError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

const SELECT_COLUMNS: &str = "id, user_id, title, event_date, event_time, event_type,
    is_important, is_completed, remote_event_id, created_at";

/// SQLite implementation of EventMirrorRepository.
pub struct SqliteEventMirrorRepository {
    pool: Arc<DbPool>,
}

impl SqliteEventMirrorRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

/// Raw row shape; date/time/enum parsing happens outside the closure.
struct MirrorRow {
    id: i64,
    user_id: i64,
    title: String,
    event_date: String,
    event_time: Option<String>,
    event_type: String,
    is_important: bool,
    is_completed: bool,
    remote_event_id: Option<String>,
    created_at: i64,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MirrorRow> {
    Ok(MirrorRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        event_date: row.get(3)?,
        event_time: row.get(4)?,
        event_type: row.get(5)?,
        is_important: row.get(6)?,
        is_completed: row.get(7)?,
        remote_event_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn row_to_mirror(row: MirrorRow) -> Result<EventMirror> {
    let event_date = NaiveDate::parse_from_str(&row.event_date, DATE_FORMAT).map_err(|e| {
        CalsyncError::Database(format!("invalid stored event_date '{}': {e}", row.event_date))
    })?;
    let event_time = row
        .event_time
        .as_deref()
        .map(|value| {
            NaiveTime::parse_from_str(value, TIME_FORMAT).map_err(|e| {
                CalsyncError::Database(format!("invalid stored event_time '{value}': {e}"))
            })
        })
        .transpose()?;
    let created_at = DateTime::from_timestamp(row.created_at, 0).ok_or_else(|| {
        CalsyncError::Database(format!("invalid stored timestamp: {}", row.created_at))
    })?;

    Ok(EventMirror {
        id: row.id,
        user_id: row.user_id,
        title: row.title,
        event_date,
        event_time,
        event_type: EventType::parse(&row.event_type)
            .map_err(|e| CalsyncError::Database(e.to_string()))?,
        is_important: row.is_important,
        is_completed: row.is_completed,
        remote_event_id: row.remote_event_id,
        created_at,
    })
}

fn format_time(time: Option<NaiveTime>) -> Option<String> {
    time.map(|t| t.format(TIME_FORMAT).to_string())
}

#[async_trait]
impl EventMirrorRepository for SqliteEventMirrorRepository {
    #[instrument(skip(self))]
    async fn find_in_range(
        &self,
        user_id: i64,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> Result<Vec<EventMirror>> {
        let conn = self.pool.get()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS}
                 FROM event_mirrors
                 WHERE user_id = ?1 AND event_date >= ?2 AND event_date < ?3
                 ORDER BY event_date ASC, event_time ASC"
            ))
            .map_err(InfraError::from)?;

        let rows = stmt
            .query_map(
                rusqlite::params![
                    user_id,
                    range_start.format(DATE_FORMAT).to_string(),
                    range_end.format(DATE_FORMAT).to_string(),
                ],
                read_row,
            )
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<MirrorRow>>>()
            .map_err(InfraError::from)?;

        debug!(user_id, count = rows.len(), "retrieved mirror rows in range");
        rows.into_iter().map(row_to_mirror).collect()
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, user_id: i64, local_id: i64) -> Result<Option<EventMirror>> {
        let conn = self.pool.get()?;

        let row = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM event_mirrors
                     WHERE id = ?1 AND user_id = ?2"
                ),
                rusqlite::params![local_id, user_id],
                read_row,
            )
            .optional()
            .map_err(InfraError::from)?;

        row.map(row_to_mirror).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_remote_id(
        &self,
        user_id: i64,
        remote_id: &str,
    ) -> Result<Option<EventMirror>> {
        let conn = self.pool.get()?;

        let row = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM event_mirrors
                     WHERE user_id = ?1 AND remote_event_id = ?2"
                ),
                rusqlite::params![user_id, remote_id],
                read_row,
            )
            .optional()
            .map_err(InfraError::from)?;

        row.map(row_to_mirror).transpose()
    }

    #[instrument(skip(self, params), fields(user_id = params.user_id))]
    async fn insert(&self, params: EventMirrorParams) -> Result<EventMirror> {
        let conn = self.pool.get()?;
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO event_mirrors
                (user_id, title, event_date, event_time, event_type,
                 is_important, is_completed, remote_event_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                params.user_id,
                params.title,
                params.event_date.format(DATE_FORMAT).to_string(),
                format_time(params.event_time),
                params.event_type.as_str(),
                params.is_important,
                params.is_completed,
                params.remote_event_id,
                created_at.timestamp(),
            ],
        )
        .map_err(InfraError::from)?;

        let id = conn.last_insert_rowid();
        debug!(user_id = params.user_id, local_id = id, "mirror row inserted");

        Ok(EventMirror {
            id,
            user_id: params.user_id,
            title: params.title,
            event_date: params.event_date,
            event_time: params.event_time,
            event_type: params.event_type,
            is_important: params.is_important,
            is_completed: params.is_completed,
            remote_event_id: params.remote_event_id,
            created_at,
        })
    }

    #[instrument(skip(self, title))]
    async fn update_schedule(
        &self,
        local_id: i64,
        title: &str,
        event_date: NaiveDate,
        event_time: Option<NaiveTime>,
    ) -> Result<()> {
        let conn = self.pool.get()?;

        let updated = conn
            .execute(
                "UPDATE event_mirrors
                 SET title = ?1, event_date = ?2, event_time = ?3
                 WHERE id = ?4",
                rusqlite::params![
                    title,
                    event_date.format(DATE_FORMAT).to_string(),
                    format_time(event_time),
                    local_id,
                ],
            )
            .map_err(InfraError::from)?;

        if updated == 0 {
            return Err(CalsyncError::NotFound(format!("no mirror row {local_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_important(&self, local_id: i64, important: bool) -> Result<()> {
        self.set_flag(local_id, "is_important", important)
    }

    #[instrument(skip(self))]
    async fn set_completed(&self, local_id: i64, completed: bool) -> Result<()> {
        self.set_flag(local_id, "is_completed", completed)
    }

    #[instrument(skip(self))]
    async fn delete(&self, local_id: i64) -> Result<()> {
        let conn = self.pool.get()?;

        conn.execute("DELETE FROM event_mirrors WHERE id = ?1", rusqlite::params![local_id])
            .map_err(InfraError::from)?;

        debug!(local_id, "mirror row deleted");
        Ok(())
    }
}

impl SqliteEventMirrorRepository {
    fn set_flag(&self, local_id: i64, column: &str, value: bool) -> Result<()> {
        let conn = self.pool.get()?;

        let updated = conn
            .execute(
                // `column` comes from the two call sites above, never input.
                &format!("UPDATE event_mirrors SET {column} = ?1 WHERE id = ?2"),
                rusqlite::params![value, local_id],
            )
            .map_err(InfraError::from)?;

        if updated == 0 {
            return Err(CalsyncError::NotFound(format!("no mirror row {local_id}")));
        }
        Ok(())
    }
}
