//! SQLite-backed implementations of the core persistence ports.

pub mod credential_repository;
pub mod event_mirror_repository;
pub mod pool;
pub mod user_repository;

pub use credential_repository::SqliteCredentialRepository;
pub use event_mirror_repository::SqliteEventMirrorRepository;
pub use pool::{DbConnection, DbPool};
pub use user_repository::SqliteUserRepository;
