//! Port interfaces for the credential lifecycle.

use async_trait::async_trait;
use calsync_domain::{CredentialRecord, ProviderSettings, Result, User};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Persistence port for [`CredentialRecord`] rows.
///
/// Rows are unique on (user_id, provider). Writes are last-writer-wins;
/// no isolation beyond row-level atomic update is required.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn find(&self, user_id: i64, provider: &str) -> Result<Option<CredentialRecord>>;

    /// Insert or replace the full record (link / re-link).
    async fn upsert(&self, record: &CredentialRecord) -> Result<()>;

    /// Persist a refreshed access token and its expiry, leaving the
    /// refresh token untouched.
    async fn update_access_token(
        &self,
        user_id: i64,
        provider: &str,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Remove the record (permanent revocation).
    async fn delete(&self, user_id: i64, provider: &str) -> Result<()>;
}

/// Account lookup supplied by the account subsystem.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
}

/// Successful response from a provider token endpoint.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    /// Issued on the authorization-code exchange; refresh responses
    /// usually omit it.
    pub refresh_token: Option<String>,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
}

/// Failure from a provider token endpoint, split along the axis the
/// refresh manager classifies on: a parsed OAuth error document versus
/// everything transient.
#[derive(Debug, Error)]
pub enum TokenEndpointError {
    /// 4xx response carrying a parsed OAuth error document.
    #[error("token request rejected ({code})")]
    Rejected { code: String, description: Option<String> },

    /// Network failure, 5xx, or a body that could not be parsed.
    #[error("token endpoint unavailable: {0}")]
    Unavailable(String),
}

/// Wire client for a provider's OAuth token endpoint.
#[async_trait]
pub trait TokenClient: Send + Sync {
    /// grant_type=refresh_token exchange.
    async fn refresh_access_token(
        &self,
        provider: &ProviderSettings,
        refresh_token: &str,
    ) -> std::result::Result<TokenGrant, TokenEndpointError>;

    /// grant_type=authorization_code exchange (initial link).
    async fn exchange_authorization_code(
        &self,
        provider: &ProviderSettings,
        code: &str,
    ) -> std::result::Result<TokenGrant, TokenEndpointError>;
}

/// Read-side port consumers use to obtain a currently-valid bearer token.
///
/// Implemented by [`TokenRefreshManager`](super::TokenRefreshManager);
/// kept as a trait so the reconciliation engine can be exercised against
/// scripted token outcomes.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn get_valid_access_token(&self, user_id: i64, provider: &str) -> Result<String>;
}
