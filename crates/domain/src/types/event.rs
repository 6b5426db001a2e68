//! Scheduling entities: local mirror rows, remote listing items, and the
//! merged read model.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{CalsyncError, Result};

/// Kind of scheduling entity a mirror row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Task,
    Meeting,
    /// Sourced from the remote provider with no local origin.
    External,
}

impl EventType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "TASK",
            Self::Meeting => "MEETING",
            Self::External => "EXTERNAL",
        }
    }

    /// Parse the database/string representation.
    ///
    /// # Errors
    /// Returns `InvalidInput` for unknown values.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "TASK" => Ok(Self::Task),
            "MEETING" => Ok(Self::Meeting),
            "EXTERNAL" => Ok(Self::External),
            other => Err(CalsyncError::InvalidInput(format!("unknown event type: {other}"))),
        }
    }
}

/// Local mirror of one scheduling entity.
///
/// `is_important` and `is_completed` are locally owned: a remote listing
/// refresh never overwrites them. `remote_event_id` is the join key to the
/// provider listing and is unique per user when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMirror {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub event_date: NaiveDate,
    /// None for all-day items.
    pub event_time: Option<NaiveTime>,
    pub event_type: EventType,
    pub is_important: bool,
    pub is_completed: bool,
    pub remote_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert parameters for a new mirror row.
#[derive(Debug, Clone)]
pub struct EventMirrorParams {
    pub user_id: i64,
    pub title: String,
    pub event_date: NaiveDate,
    pub event_time: Option<NaiveTime>,
    pub event_type: EventType,
    pub is_important: bool,
    pub is_completed: bool,
    pub remote_event_id: Option<String>,
}

/// Start or end of a remote item, preserving the all-day/timed distinction
/// exactly as received from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    Timed(DateTime<Utc>),
    AllDay(NaiveDate),
}

impl EventTime {
    /// Calendar date of this instant.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Timed(dt) => dt.date_naive(),
            Self::AllDay(date) => *date,
        }
    }

    /// Time of day, None for all-day values.
    #[must_use]
    pub fn time_of_day(&self) -> Option<NaiveTime> {
        match self {
            Self::Timed(dt) => Some(dt.time()),
            Self::AllDay(_) => None,
        }
    }

    #[must_use]
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }
}

/// Normalized view of one item from the provider's listing or mutation
/// response. Transient: produced by the gateway, consumed by the
/// reconciliation engine within one request, never persisted.
#[derive(Debug, Clone)]
pub struct RemoteEvent {
    pub remote_id: String,
    pub summary: Option<String>,
    pub start: EventTime,
    pub end: Option<EventTime>,
    pub status: Option<String>,
    pub html_link: Option<String>,
}

/// Merged read-model row returned by the reconciliation engine.
///
/// Scheduling fields come from the remote provider when a listing item is
/// available; locally-owned fields always come from the mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedEvent {
    /// Local mirror id; None for remote-only items.
    pub id: Option<i64>,
    pub user_id: i64,
    pub title: String,
    pub event_date: NaiveDate,
    pub event_time: Option<NaiveTime>,
    pub event_type: EventType,
    pub is_important: bool,
    pub is_completed: bool,
    pub remote_event_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl UnifiedEvent {
    /// Render a mirror row using only local data.
    #[must_use]
    pub fn from_mirror(mirror: &EventMirror) -> Self {
        Self {
            id: Some(mirror.id),
            user_id: mirror.user_id,
            title: mirror.title.clone(),
            event_date: mirror.event_date,
            event_time: mirror.event_time,
            event_type: mirror.event_type,
            is_important: mirror.is_important,
            is_completed: mirror.is_completed,
            remote_event_id: mirror.remote_event_id.clone(),
            created_at: Some(mirror.created_at),
        }
    }

    /// Merge a mirror row with its remote counterpart: scheduling fields
    /// from the remote item, locally-owned fields from the mirror.
    #[must_use]
    pub fn merged(mirror: &EventMirror, remote: &RemoteEvent) -> Self {
        Self {
            id: Some(mirror.id),
            user_id: mirror.user_id,
            title: remote.summary.clone().unwrap_or_else(|| mirror.title.clone()),
            event_date: remote.start.date(),
            event_time: remote.start.time_of_day(),
            event_type: mirror.event_type,
            is_important: mirror.is_important,
            is_completed: mirror.is_completed,
            remote_event_id: mirror.remote_event_id.clone(),
            created_at: Some(mirror.created_at),
        }
    }

    /// Render a remote item that has no local mirror, with defaults for the
    /// locally-owned fields.
    #[must_use]
    pub fn from_remote(user_id: i64, remote: &RemoteEvent) -> Self {
        Self {
            id: None,
            user_id,
            title: remote.summary.clone().unwrap_or_default(),
            event_date: remote.start.date(),
            event_time: remote.start.time_of_day(),
            event_type: EventType::External,
            is_important: false,
            is_completed: false,
            remote_event_id: Some(remote.remote_id.clone()),
            created_at: None,
        }
    }
}

/// Read-path result: the merged listing plus a degradation flag the caller
/// can use to prompt for re-linking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFeed {
    pub events: Vec<UnifiedEvent>,
    /// True when remote enrichment was skipped (credential problem or
    /// provider outage) and the feed was served from local data only.
    pub degraded: bool,
}

/// Write-path input for creating or updating an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub event_date: NaiveDate,
    /// None for an all-day event.
    pub event_time: Option<NaiveTime>,
    pub event_type: EventType,
}

impl EventDraft {
    /// Validate caller-supplied fields.
    ///
    /// # Errors
    /// Returns `InvalidInput` when the title is empty or whitespace.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(CalsyncError::InvalidInput("event title must not be empty".to_string()));
        }
        Ok(())
    }
}
