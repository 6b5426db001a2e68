//! End-to-end reconciliation tests: real SQLite, real repositories, real
//! token manager, mock provider.
//!
//! **Coverage:**
//! - Merged read: remote scheduling fields + locally-owned flags
//! - Expired credential: refresh-then-list with the new bearer token
//! - Degraded read: revoked link still serves local rows
//! - Create: remote-first write lands a linked mirror row
//! - Delete: local mirror removed even when the remote delete fails
//!
//! **Infrastructure:**
//! - Real SQLite database (tempdir)
//! - One WireMock server simulating both the token endpoint and the
//!   calendar API

#[path = "support.rs"]
mod support;

use std::sync::Arc;

use calsync_core::{CalendarService, CredentialRepository, EventMirrorRepository, TokenRefreshManager};
use calsync_domain::{CredentialRecord, EventDraft, EventMirrorParams, EventType};
use calsync_infra::database::{
    SqliteCredentialRepository, SqliteEventMirrorRepository, SqliteUserRepository,
};
use calsync_infra::{GoogleCalendarGateway, GoogleTokenClient};
use chrono::{Duration, NaiveDate, Utc};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Stack {
    db: support::TestDatabase,
    credentials: Arc<SqliteCredentialRepository>,
    mirrors: Arc<SqliteEventMirrorRepository>,
    service: CalendarService,
}

async fn stack(server: &MockServer) -> Stack {
    let db = support::TestDatabase::new();
    let credentials = Arc::new(SqliteCredentialRepository::new(db.pool.clone()));
    let mirrors = Arc::new(SqliteEventMirrorRepository::new(db.pool.clone()));
    let users = Arc::new(SqliteUserRepository::new(db.pool.clone()));

    let manager = Arc::new(TokenRefreshManager::new(
        credentials.clone(),
        users,
        Arc::new(GoogleTokenClient::new().expect("client should build")),
        support::registry_for(&format!("{}/token", server.uri())),
    ));

    let gateway = Arc::new(
        GoogleCalendarGateway::new().expect("gateway should build").with_api_base(server.uri()),
    );

    let service = CalendarService::new(mirrors.clone(), gateway, manager);

    Stack { db, credentials, mirrors, service }
}

fn linked_credential(user_id: i64, expires_in_secs: i64) -> CredentialRecord {
    CredentialRecord {
        user_id,
        provider: "google".to_string(),
        access_token: Some("t1".to_string()),
        refresh_token: Some("rt-1".to_string()),
        expires_at: Some(Utc::now() + Duration::seconds(expires_in_secs)),
        updated_at: Utc::now(),
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn params(user_id: i64, title: &str, day: u32, remote_id: Option<&str>) -> EventMirrorParams {
    EventMirrorParams {
        user_id,
        title: title.to_string(),
        event_date: date(2025, 1, day),
        event_time: None,
        event_type: EventType::Task,
        is_important: false,
        is_completed: false,
        remote_event_id: remote_id.map(String::from),
    }
}

#[tokio::test]
async fn test_merged_read_keeps_local_flags_and_remote_titles() {
    let server = MockServer::start().await;
    let stack = stack(&server).await;
    let user_id = stack.db.insert_user("merge@example.com");
    stack.credentials.upsert(&linked_credential(user_id, 3600)).await.unwrap();

    let mut important = params(user_id, "old", 2, Some("g1"));
    important.is_important = true;
    stack.mirrors.insert(important).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                {
                    "id": "g1",
                    "summary": "Standup",
                    "status": "confirmed",
                    "start": {"dateTime": "2025-01-02T09:00:00Z"},
                    "end": {"dateTime": "2025-01-02T09:30:00Z"}
                },
                {
                    "id": "g2",
                    "summary": "Review",
                    "status": "confirmed",
                    "start": {"dateTime": "2025-01-03T14:00:00Z"},
                    "end": {"dateTime": "2025-01-03T15:00:00Z"}
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let feed = stack.service.get_events(user_id, date(2025, 1, 1), date(2025, 1, 8)).await.unwrap();

    assert!(!feed.degraded);
    assert_eq!(feed.events.len(), 2);

    let g1 = feed.events.iter().find(|e| e.remote_event_id.as_deref() == Some("g1")).unwrap();
    assert_eq!(g1.title, "Standup");
    assert!(g1.is_important);
    assert!(g1.id.is_some());

    let g2 = feed.events.iter().find(|e| e.remote_event_id.as_deref() == Some("g2")).unwrap();
    assert_eq!(g2.title, "Review");
    assert!(!g2.is_important);
    assert!(!g2.is_completed);
    assert_eq!(g2.id, None);
}

#[tokio::test]
async fn test_expired_credential_refreshes_then_lists() {
    let server = MockServer::start().await;
    let stack = stack(&server).await;
    let user_id = stack.db.insert_user("refresh@example.com");
    stack.credentials.upsert(&linked_credential(user_id, -10)).await.unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "t2",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    // The listing must be made with the refreshed bearer token.
    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .and(header("authorization", "Bearer t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let feed = stack.service.get_events(user_id, date(2025, 1, 1), date(2025, 1, 8)).await.unwrap();
    assert!(!feed.degraded);
    assert!(feed.events.is_empty());
}

#[tokio::test]
async fn test_revoked_link_degrades_to_local_rows() {
    let server = MockServer::start().await;
    let stack = stack(&server).await;
    let user_id = stack.db.insert_user("degraded@example.com");
    stack.credentials.upsert(&linked_credential(user_id, -10)).await.unwrap();

    stack.mirrors.insert(params(user_id, "linked row", 2, Some("g1"))).await.unwrap();
    stack.mirrors.insert(params(user_id, "local row", 3, None)).await.unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Token has been revoked."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let feed = stack.service.get_events(user_id, date(2025, 1, 1), date(2025, 1, 8)).await.unwrap();

    assert!(feed.degraded);
    let titles: Vec<&str> = feed.events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["linked row", "local row"]);

    // The revocation cleared the stored credential.
    assert!(stack.credentials.find(user_id, "google").await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_event_persists_linked_mirror() {
    let server = MockServer::start().await;
    let stack = stack(&server).await;
    let user_id = stack.db.insert_user("create@example.com");
    stack.credentials.upsert(&linked_credential(user_id, 3600)).await.unwrap();

    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "g-created",
            "summary": "Planning",
            "status": "confirmed",
            "start": {"date": "2025-01-06"},
            "end": {"date": "2025-01-07"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let draft = EventDraft {
        title: "Planning".to_string(),
        event_date: date(2025, 1, 6),
        event_time: None,
        event_type: EventType::Task,
    };

    let created = stack.service.create_event(user_id, &draft).await.unwrap();
    assert_eq!(created.remote_event_id.as_deref(), Some("g-created"));

    let stored =
        stack.mirrors.find_by_remote_id(user_id, "g-created").await.unwrap().unwrap();
    assert_eq!(stored.title, "Planning");
    assert_eq!(stored.event_date, date(2025, 1, 6));
    assert!(!stored.is_important);
    assert!(!stored.is_completed);
}

#[tokio::test]
async fn test_delete_event_removes_mirror_despite_remote_failure() {
    let server = MockServer::start().await;
    let stack = stack(&server).await;
    let user_id = stack.db.insert_user("delete@example.com");
    stack.credentials.upsert(&linked_credential(user_id, 3600)).await.unwrap();

    let mirror = stack.mirrors.insert(params(user_id, "doomed", 2, Some("g1"))).await.unwrap();

    Mock::given(method("DELETE"))
        .and(path("/calendars/primary/events/g1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    stack.service.delete_event(user_id, "g1").await.unwrap();

    assert!(stack.mirrors.find_by_id(user_id, mirror.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_toggles_persist_through_merged_reads() {
    let server = MockServer::start().await;
    let stack = stack(&server).await;
    let user_id = stack.db.insert_user("toggle@example.com");
    stack.credentials.upsert(&linked_credential(user_id, 3600)).await.unwrap();

    let mirror = stack.mirrors.insert(params(user_id, "task", 2, Some("g1"))).await.unwrap();

    assert!(stack.service.toggle_importance(user_id, mirror.id).await.unwrap());
    assert!(stack.service.toggle_completion(user_id, mirror.id).await.unwrap());

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{
                "id": "g1",
                "summary": "task (remote title)",
                "status": "confirmed",
                "start": {"dateTime": "2025-01-02T09:00:00Z"},
                "end": {"dateTime": "2025-01-02T10:00:00Z"}
            }]
        })))
        .mount(&server)
        .await;

    let feed = stack.service.get_events(user_id, date(2025, 1, 1), date(2025, 1, 8)).await.unwrap();
    let merged = feed.events.iter().find(|e| e.id == Some(mirror.id)).unwrap();
    assert_eq!(merged.title, "task (remote title)");
    assert!(merged.is_important);
    assert!(merged.is_completed);
}
