//! # Calsync Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The token refresh manager (credential lifecycle)
//! - The reconciliation engine (merged calendar reads, remote-first writes)
//! - Port/adapter interfaces (traits) for persistence and the provider API
//!
//! ## Architecture Principles
//! - Only depends on `calsync-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod auth;
pub mod calendar;

// Re-export specific items to avoid ambiguity
pub use auth::ports::{
    AccessTokenSource, CredentialRepository, TokenClient, TokenEndpointError, TokenGrant,
    UserRepository,
};
pub use auth::TokenRefreshManager;
pub use calendar::ports::{CalendarGateway, EventMirrorRepository};
pub use calendar::CalendarService;
