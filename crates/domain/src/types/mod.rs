//! Domain types and models

pub mod credential;
pub mod event;

use serde::{Deserialize, Serialize};

// Re-export for convenience
pub use credential::CredentialRecord;
pub use event::{
    EventDraft, EventFeed, EventMirror, EventMirrorParams, EventTime, EventType, RemoteEvent,
    UnifiedEvent,
};

/// Minimal account view supplied by the account subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
}
