//! Reconciliation engine.
//!
//! Merges the authoritative remote listing with locally-owned mirror rows
//! on the read path (degrading to local-only data on credential or
//! provider failure), and drives remote-first writes with the documented
//! partial-failure policy on the write path.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use calsync_domain::constants::{DEFAULT_CALENDAR_ID, PROVIDER_GOOGLE};
use calsync_domain::{
    CalsyncError, EventDraft, EventFeed, EventMirror, EventMirrorParams, RemoteEvent, Result,
    UnifiedEvent,
};
use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, error, info, instrument, warn};

use super::ports::{CalendarGateway, EventMirrorRepository};
use crate::auth::ports::AccessTokenSource;

/// Calendar read/write service backed by one provider calendar.
pub struct CalendarService {
    mirrors: Arc<dyn EventMirrorRepository>,
    gateway: Arc<dyn CalendarGateway>,
    tokens: Arc<dyn AccessTokenSource>,
    provider: String,
    calendar_id: String,
}

impl CalendarService {
    #[must_use]
    pub fn new(
        mirrors: Arc<dyn EventMirrorRepository>,
        gateway: Arc<dyn CalendarGateway>,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Self {
        Self {
            mirrors,
            gateway,
            tokens,
            provider: PROVIDER_GOOGLE.to_string(),
            calendar_id: DEFAULT_CALENDAR_ID.to_string(),
        }
    }

    #[must_use]
    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Merged listing for the half-open date range
    /// [range_start, range_end).
    ///
    /// Credential problems and provider outages degrade the feed to local
    /// data instead of failing the read; `EventFeed::degraded` tells the
    /// caller remote enrichment was skipped.
    #[instrument(skip(self))]
    pub async fn get_events(
        &self,
        user_id: i64,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> Result<EventFeed> {
        let mirrors = self.mirrors.find_in_range(user_id, range_start, range_end).await?;
        let (linked, local_only): (Vec<EventMirror>, Vec<EventMirror>) =
            mirrors.into_iter().partition(|mirror| mirror.remote_event_id.is_some());

        let access_token = match self.tokens.get_valid_access_token(user_id, &self.provider).await
        {
            Ok(token) => token,
            Err(
                err @ (CalsyncError::CredentialMissing(_)
                | CalsyncError::ReauthRequired(_)
                | CalsyncError::UpstreamUnavailable(_)),
            ) => {
                warn!(user_id, error = %err, "no usable access token; serving local-only feed");
                return Ok(degraded_feed(linked, local_only));
            }
            Err(err) => return Err(err),
        };

        let remote = match self
            .gateway
            .list_events(&access_token, &self.calendar_id, range_start, range_end)
            .await
        {
            Ok(items) => items,
            Err(err) => {
                warn!(user_id, error = %err, "remote listing failed; serving local-only feed");
                return Ok(degraded_feed(linked, local_only));
            }
        };

        debug!(
            user_id,
            linked = linked.len(),
            local_only = local_only.len(),
            remote = remote.len(),
            "merging remote listing with mirror rows"
        );

        let by_remote_id: HashMap<&str, &RemoteEvent> =
            remote.iter().map(|event| (event.remote_id.as_str(), event)).collect();

        let mut events = Vec::with_capacity(linked.len() + local_only.len() + remote.len());
        let mut matched: HashSet<&str> = HashSet::with_capacity(linked.len());

        for mirror in &linked {
            if let Some(remote_id) = mirror.remote_event_id.as_deref() {
                match by_remote_id.get(remote_id) {
                    Some(remote_event) => {
                        matched.insert(remote_id);
                        events.push(UnifiedEvent::merged(mirror, remote_event));
                    }
                    // Stale or deleted remotely: fall back to local fields.
                    None => events.push(UnifiedEvent::from_mirror(mirror)),
                }
            }
        }

        for remote_event in &remote {
            if !matched.contains(remote_event.remote_id.as_str()) {
                events.push(UnifiedEvent::from_remote(user_id, remote_event));
            }
        }

        events.extend(local_only.iter().map(UnifiedEvent::from_mirror));
        sort_feed(&mut events);

        Ok(EventFeed { events, degraded: false })
    }

    /// Create an event remotely first, then mirror it locally.
    ///
    /// # Errors
    /// Token and gateway errors propagate unmodified - no local row is
    /// written unless the remote create succeeded. A local insert failure
    /// after remote success leaves an unmirrored remote event behind; it
    /// is logged and propagated, with no compensating delete.
    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub async fn create_event(&self, user_id: i64, draft: &EventDraft) -> Result<UnifiedEvent> {
        draft.validate()?;

        let access_token = self.tokens.get_valid_access_token(user_id, &self.provider).await?;
        let remote =
            self.gateway.create_event(&access_token, &self.calendar_id, draft).await?;

        let params = EventMirrorParams {
            user_id,
            title: draft.title.clone(),
            event_date: draft.event_date,
            event_time: draft.event_time,
            event_type: draft.event_type,
            is_important: false,
            is_completed: false,
            remote_event_id: Some(remote.remote_id.clone()),
        };

        let mirror = match self.mirrors.insert(params).await {
            Ok(mirror) => mirror,
            Err(err) => {
                error!(
                    user_id,
                    remote_event_id = %remote.remote_id,
                    error = %err,
                    "remote event created but local mirror insert failed"
                );
                return Err(err);
            }
        };

        info!(user_id, remote_event_id = %remote.remote_id, "event created");
        Ok(UnifiedEvent::merged(&mirror, &remote))
    }

    /// Create a local-only entity with no remote counterpart. No network.
    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub async fn create_local_task(
        &self,
        user_id: i64,
        draft: &EventDraft,
    ) -> Result<UnifiedEvent> {
        draft.validate()?;

        let mirror = self
            .mirrors
            .insert(EventMirrorParams {
                user_id,
                title: draft.title.clone(),
                event_date: draft.event_date,
                event_time: draft.event_time,
                event_type: draft.event_type,
                is_important: false,
                is_completed: false,
                remote_event_id: None,
            })
            .await?;

        debug!(user_id, local_id = mirror.id, "local-only entry created");
        Ok(UnifiedEvent::from_mirror(&mirror))
    }

    /// Update the scheduling fields of a mirrored event, remote first.
    ///
    /// # Errors
    /// `NotFound` when no mirror row for (user, remote_event_id) exists -
    /// another user's mirror or an unmirrored remote id cannot be updated
    /// through this path. Gateway failure aborts before any local write.
    #[instrument(skip(self, draft))]
    pub async fn update_event(
        &self,
        user_id: i64,
        remote_event_id: &str,
        draft: &EventDraft,
    ) -> Result<UnifiedEvent> {
        draft.validate()?;

        let mirror = self.require_mirror(user_id, remote_event_id).await?;
        let access_token = self.tokens.get_valid_access_token(user_id, &self.provider).await?;
        let remote = self
            .gateway
            .update_event(&access_token, &self.calendar_id, remote_event_id, draft)
            .await?;

        self.mirrors
            .update_schedule(mirror.id, &draft.title, draft.event_date, draft.event_time)
            .await?;

        let updated = EventMirror {
            title: draft.title.clone(),
            event_date: draft.event_date,
            event_time: draft.event_time,
            ..mirror
        };

        info!(user_id, remote_event_id, "event updated");
        Ok(UnifiedEvent::merged(&updated, &remote))
    }

    /// Delete a mirrored event.
    ///
    /// The remote delete is attempted first, but any remote-side failure
    /// (token or gateway) is logged and the local mirror is deleted
    /// anyway - the user's delete action is never blocked by the
    /// provider. Contrast with create/update, which abort on remote
    /// failure.
    #[instrument(skip(self))]
    pub async fn delete_event(&self, user_id: i64, remote_event_id: &str) -> Result<()> {
        let mirror = self.require_mirror(user_id, remote_event_id).await?;
        self.delete_mirror(&mirror).await
    }

    /// Delete a local entity by its mirror id, attempting the remote
    /// delete when the row is linked. Same partial-failure policy as
    /// [`delete_event`](Self::delete_event).
    #[instrument(skip(self))]
    pub async fn delete_local_event(&self, user_id: i64, local_id: i64) -> Result<()> {
        let mirror = self.require_row(user_id, local_id).await?;
        self.delete_mirror(&mirror).await
    }

    /// Flip the locally-owned importance flag; returns the new value.
    #[instrument(skip(self))]
    pub async fn toggle_importance(&self, user_id: i64, local_id: i64) -> Result<bool> {
        let mirror = self.require_row(user_id, local_id).await?;
        let important = !mirror.is_important;
        self.mirrors.set_important(local_id, important).await?;
        debug!(user_id, local_id, important, "importance toggled");
        Ok(important)
    }

    /// Flip the locally-owned completion flag; returns the new value.
    #[instrument(skip(self))]
    pub async fn toggle_completion(&self, user_id: i64, local_id: i64) -> Result<bool> {
        let mirror = self.require_row(user_id, local_id).await?;
        let completed = !mirror.is_completed;
        self.mirrors.set_completed(local_id, completed).await?;
        debug!(user_id, local_id, completed, "completion toggled");
        Ok(completed)
    }

    async fn delete_mirror(&self, mirror: &EventMirror) -> Result<()> {
        if let Some(remote_id) = mirror.remote_event_id.as_deref() {
            match self.tokens.get_valid_access_token(mirror.user_id, &self.provider).await {
                Ok(access_token) => {
                    if let Err(err) = self
                        .gateway
                        .delete_event(&access_token, &self.calendar_id, remote_id)
                        .await
                    {
                        warn!(
                            user_id = mirror.user_id,
                            remote_event_id = remote_id,
                            error = %err,
                            "remote delete failed; deleting local mirror anyway"
                        );
                    }
                }
                Err(err) => {
                    warn!(
                        user_id = mirror.user_id,
                        remote_event_id = remote_id,
                        error = %err,
                        "no access token for remote delete; deleting local mirror anyway"
                    );
                }
            }
        }

        self.mirrors.delete(mirror.id).await?;
        info!(user_id = mirror.user_id, local_id = mirror.id, "event deleted");
        Ok(())
    }

    async fn require_mirror(&self, user_id: i64, remote_event_id: &str) -> Result<EventMirror> {
        self.mirrors.find_by_remote_id(user_id, remote_event_id).await?.ok_or_else(|| {
            CalsyncError::NotFound(format!(
                "no mirrored event {remote_event_id} for user {user_id}"
            ))
        })
    }

    async fn require_row(&self, user_id: i64, local_id: i64) -> Result<EventMirror> {
        self.mirrors.find_by_id(user_id, local_id).await?.ok_or_else(|| {
            CalsyncError::NotFound(format!("no event {local_id} for user {user_id}"))
        })
    }
}

fn degraded_feed(linked: Vec<EventMirror>, local_only: Vec<EventMirror>) -> EventFeed {
    let mut events: Vec<UnifiedEvent> =
        linked.iter().chain(local_only.iter()).map(UnifiedEvent::from_mirror).collect();
    sort_feed(&mut events);
    EventFeed { events, degraded: true }
}

/// Sort by date then time, all-day items first within a day.
fn sort_feed(events: &mut [UnifiedEvent]) {
    events.sort_by_key(|event| {
        (event.event_date, event.event_time.unwrap_or(NaiveTime::MIN), event.event_time.is_some())
    });
}
