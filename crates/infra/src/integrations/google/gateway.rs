//! Google Calendar API gateway.
//!
//! Thin, failure-aware wrapper over the events endpoints. Provider JSON is
//! translated to [`RemoteEvent`]; every non-2xx response surfaces as a
//! typed `Gateway` error for the reconciliation engine to classify.

use std::time::Duration;

use async_trait::async_trait;
use calsync_core::CalendarGateway;
use calsync_domain::constants::PROVIDER_HTTP_TIMEOUT_SECS;
use calsync_domain::{
    CalsyncError, EventDraft, EventTime, RemoteEvent, Result,
};
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::errors::InfraError;

const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Gateway over the Google Calendar v3 events API.
pub struct GoogleCalendarGateway {
    http: Client,
    api_base: String,
}

impl GoogleCalendarGateway {
    /// Build the gateway with the bounded provider timeout.
    ///
    /// # Errors
    /// Returns `Internal` when the HTTP client cannot be constructed.
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(PROVIDER_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| CalsyncError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, api_base: GOOGLE_CALENDAR_API_BASE.to_string() })
    }

    /// Point the gateway at a different API base (tests).
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!("{}/calendars/{}/events", self.api_base, calendar_id)
    }

    fn event_url(&self, calendar_id: &str, remote_id: &str) -> String {
        format!("{}/calendars/{}/events/{}", self.api_base, calendar_id, remote_id)
    }
}

/// Surface non-2xx responses as a typed error carrying the raw body.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(CalsyncError::Gateway { status: status.as_u16(), body })
}

#[async_trait]
impl CalendarGateway for GoogleCalendarGateway {
    #[instrument(skip(self, access_token))]
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> Result<Vec<RemoteEvent>> {
        // Half-open [range_start, range_end) expressed as UTC instants.
        let time_min = range_start.and_time(NaiveTime::MIN).and_utc();
        let time_max = range_end.and_time(NaiveTime::MIN).and_utc();

        // Expanded occurrences in start order, the shape the merge expects.
        let query: [(&str, String); 5] = [
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("timeMin", time_min.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("timeMax", time_max.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("timeZone", "UTC".to_string()),
        ];

        let response = self
            .http
            .get(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await
            .map_err(InfraError::from)?;

        let response = check_status(response).await?;
        let listing: GoogleEventsResponse =
            response.json().await.map_err(InfraError::from)?;

        debug!(calendar_id, count = listing.items.len(), "fetched remote listing");
        listing.items.into_iter().map(payload_to_remote_event).collect()
    }

    #[instrument(skip(self, access_token, draft), fields(title = %draft.title))]
    async fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        draft: &EventDraft,
    ) -> Result<RemoteEvent> {
        let response = self
            .http
            .post(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .json(&draft_to_request(draft))
            .send()
            .await
            .map_err(InfraError::from)?;

        let response = check_status(response).await?;
        let payload: GoogleEventPayload = response.json().await.map_err(InfraError::from)?;

        debug!(calendar_id, remote_id = %payload.id, "remote event created");
        payload_to_remote_event(payload)
    }

    #[instrument(skip(self, access_token, draft))]
    async fn update_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        remote_id: &str,
        draft: &EventDraft,
    ) -> Result<RemoteEvent> {
        let response = self
            .http
            .patch(self.event_url(calendar_id, remote_id))
            .bearer_auth(access_token)
            .json(&draft_to_request(draft))
            .send()
            .await
            .map_err(InfraError::from)?;

        let response = check_status(response).await?;
        let payload: GoogleEventPayload = response.json().await.map_err(InfraError::from)?;

        debug!(calendar_id, remote_id, "remote event updated");
        payload_to_remote_event(payload)
    }

    #[instrument(skip(self, access_token))]
    async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        remote_id: &str,
    ) -> Result<()> {
        let response = self
            .http
            .delete(self.event_url(calendar_id, remote_id))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(InfraError::from)?;

        check_status(response).await?;
        debug!(calendar_id, remote_id, "remote event deleted");
        Ok(())
    }
}

/* -------------------------------------------------------------------------- */
/* Wire DTOs */
/* -------------------------------------------------------------------------- */

/// `start`/`end` object: exactly one of `date` (all-day) or `dateTime`
/// (timed, RFC3339). The shape is preserved verbatim for wire
/// compatibility.
#[derive(Debug, Serialize, Deserialize)]
struct EventDateTimePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleEventsResponse {
    #[serde(default)]
    items: Vec<GoogleEventPayload>,
}

#[derive(Debug, Deserialize)]
struct GoogleEventPayload {
    id: String,
    summary: Option<String>,
    status: Option<String>,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
    start: Option<EventDateTimePayload>,
    end: Option<EventDateTimePayload>,
}

#[derive(Debug, Serialize)]
struct GoogleEventRequest {
    summary: String,
    start: EventDateTimePayload,
    end: EventDateTimePayload,
}

fn payload_to_event_time(payload: &EventDateTimePayload) -> Result<EventTime> {
    if let Some(date_time) = payload.date_time.as_deref() {
        let parsed = DateTime::parse_from_rfc3339(date_time).map_err(|e| {
            CalsyncError::InvalidInput(format!("invalid event dateTime '{date_time}': {e}"))
        })?;
        return Ok(EventTime::Timed(parsed.with_timezone(&Utc)));
    }
    if let Some(date) = payload.date.as_deref() {
        let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
            CalsyncError::InvalidInput(format!("invalid event date '{date}': {e}"))
        })?;
        return Ok(EventTime::AllDay(parsed));
    }
    Err(CalsyncError::InvalidInput(
        "event time carries neither date nor dateTime".to_string(),
    ))
}

fn event_time_to_payload(time: &EventTime) -> EventDateTimePayload {
    match time {
        EventTime::Timed(instant) => EventDateTimePayload {
            date: None,
            date_time: Some(instant.to_rfc3339_opts(SecondsFormat::Secs, true)),
        },
        EventTime::AllDay(date) => EventDateTimePayload {
            date: Some(date.format("%Y-%m-%d").to_string()),
            date_time: None,
        },
    }
}

/// Outbound shape for a draft: a timed draft gets a one-hour window; an
/// all-day draft gets the provider's exclusive next-day end date.
fn draft_to_request(draft: &EventDraft) -> GoogleEventRequest {
    let (start, end) = match draft.event_time {
        Some(time) => {
            let start = draft.event_date.and_time(time).and_utc();
            (EventTime::Timed(start), EventTime::Timed(start + chrono::Duration::hours(1)))
        }
        None => (
            EventTime::AllDay(draft.event_date),
            EventTime::AllDay(draft.event_date + chrono::Duration::days(1)),
        ),
    };

    GoogleEventRequest {
        summary: draft.title.clone(),
        start: event_time_to_payload(&start),
        end: event_time_to_payload(&end),
    }
}

fn payload_to_remote_event(payload: GoogleEventPayload) -> Result<RemoteEvent> {
    let start = payload
        .start
        .as_ref()
        .ok_or_else(|| {
            CalsyncError::InvalidInput(format!("event {} has no start", payload.id))
        })
        .and_then(payload_to_event_time)?;
    let end = payload.end.as_ref().map(payload_to_event_time).transpose()?;

    Ok(RemoteEvent {
        remote_id: payload.id,
        summary: payload.summary.filter(|s| !s.trim().is_empty()),
        start,
        end,
        status: payload.status,
        html_link: payload.html_link,
    })
}

#[cfg(test)]
mod tests {
    use calsync_domain::EventType;

    use super::*;

    #[test]
    fn test_all_day_payload_maps_to_all_day_variant() {
        let payload = EventDateTimePayload { date: Some("2025-01-05".into()), date_time: None };
        let time = payload_to_event_time(&payload).unwrap();
        assert_eq!(time, EventTime::AllDay(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap()));
    }

    #[test]
    fn test_timed_payload_maps_to_timed_variant() {
        let payload = EventDateTimePayload {
            date: None,
            date_time: Some("2025-01-05T10:00:00+09:00".into()),
        };
        let time = payload_to_event_time(&payload).unwrap();
        match time {
            EventTime::Timed(instant) => {
                assert_eq!(
                    instant,
                    "2025-01-05T01:00:00Z".parse::<DateTime<Utc>>().unwrap()
                );
            }
            EventTime::AllDay(_) => panic!("expected timed variant"),
        }
    }

    #[test]
    fn test_empty_payload_is_invalid() {
        let payload = EventDateTimePayload { date: None, date_time: None };
        assert!(payload_to_event_time(&payload).is_err());
    }

    #[test]
    fn test_all_day_draft_serializes_date_fields_only() {
        let draft = EventDraft {
            title: "Offsite".to_string(),
            event_date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            event_time: None,
            event_type: EventType::Meeting,
        };
        let request = draft_to_request(&draft);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["start"]["date"], "2025-01-05");
        assert_eq!(json["end"]["date"], "2025-01-06");
        assert!(json["start"].get("dateTime").is_none());
    }

    #[test]
    fn test_timed_draft_serializes_date_time_fields_only() {
        let draft = EventDraft {
            title: "Standup".to_string(),
            event_date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            event_time: NaiveTime::from_hms_opt(9, 30, 0),
            event_type: EventType::Meeting,
        };
        let request = draft_to_request(&draft);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["start"]["dateTime"], "2025-01-05T09:30:00Z");
        assert_eq!(json["end"]["dateTime"], "2025-01-05T10:30:00Z");
        assert!(json["start"].get("date").is_none());
    }

    #[test]
    fn test_blank_summary_normalized_to_none() {
        let payload = GoogleEventPayload {
            id: "g1".to_string(),
            summary: Some("   ".to_string()),
            status: Some("confirmed".to_string()),
            html_link: None,
            start: Some(EventDateTimePayload { date: Some("2025-01-05".into()), date_time: None }),
            end: None,
        };
        let remote = payload_to_remote_event(payload).unwrap();
        assert_eq!(remote.summary, None);
        assert!(remote.start.is_all_day());
    }
}
