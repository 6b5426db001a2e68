//! Port interfaces for the reconciliation engine.

use async_trait::async_trait;
use calsync_domain::{EventDraft, EventMirror, EventMirrorParams, RemoteEvent, Result};
use chrono::{NaiveDate, NaiveTime};

/// Failure-aware wrapper over the remote calendar API.
///
/// Implementations translate provider JSON into [`RemoteEvent`] and
/// surface every non-2xx response as a typed `Gateway` error — degrading
/// to local-only data is the reconciliation engine's decision, not this
/// layer's.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    /// List expanded, time-ordered occurrences for the half-open range
    /// [range_start, range_end).
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> Result<Vec<RemoteEvent>>;

    async fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        draft: &EventDraft,
    ) -> Result<RemoteEvent>;

    async fn update_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        remote_id: &str,
        draft: &EventDraft,
    ) -> Result<RemoteEvent>;

    async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        remote_id: &str,
    ) -> Result<()>;
}

/// Persistence port for [`EventMirror`] rows.
#[async_trait]
pub trait EventMirrorRepository: Send + Sync {
    /// Rows whose event_date falls in the half-open range
    /// [range_start, range_end).
    async fn find_in_range(
        &self,
        user_id: i64,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> Result<Vec<EventMirror>>;

    async fn find_by_id(&self, user_id: i64, local_id: i64) -> Result<Option<EventMirror>>;

    async fn find_by_remote_id(
        &self,
        user_id: i64,
        remote_id: &str,
    ) -> Result<Option<EventMirror>>;

    async fn insert(&self, params: EventMirrorParams) -> Result<EventMirror>;

    /// Update the scheduling fields only; locally-owned flags are never
    /// touched through this path.
    async fn update_schedule(
        &self,
        local_id: i64,
        title: &str,
        event_date: NaiveDate,
        event_time: Option<NaiveTime>,
    ) -> Result<()>;

    async fn set_important(&self, local_id: i64, important: bool) -> Result<()>;

    async fn set_completed(&self, local_id: i64, completed: bool) -> Result<()>;

    async fn delete(&self, local_id: i64) -> Result<()>;
}
