//! Token refresh manager.
//!
//! Keeps short-lived access tokens fresh using stored refresh tokens:
//! - Cached-token fast path when the expiry is comfortably in the future
//! - Lazy inline refresh behind a single-flight gate per (user, provider)
//! - Structured classification of provider failures: `invalid_grant` is
//!   permanent revocation, everything else is transient

use std::sync::Arc;

use async_trait::async_trait;
use calsync_domain::constants::REFRESH_THRESHOLD_SECONDS;
use calsync_domain::{CalsyncError, CredentialRecord, ProviderRegistry, Result};
use chrono::{Duration, Utc};
use tracing::{debug, info, instrument, warn};

use super::flight::RefreshGates;
use super::ports::{
    AccessTokenSource, CredentialRepository, TokenClient, TokenEndpointError, UserRepository,
};

/// OAuth error code a provider returns when the refresh token itself is no
/// longer honored.
const INVALID_GRANT: &str = "invalid_grant";

/// Credential lifecycle manager for linked provider accounts.
pub struct TokenRefreshManager {
    credentials: Arc<dyn CredentialRepository>,
    users: Arc<dyn UserRepository>,
    token_client: Arc<dyn TokenClient>,
    providers: ProviderRegistry,
    refresh_threshold_seconds: i64,
    gates: RefreshGates,
}

impl TokenRefreshManager {
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialRepository>,
        users: Arc<dyn UserRepository>,
        token_client: Arc<dyn TokenClient>,
        providers: ProviderRegistry,
    ) -> Self {
        Self {
            credentials,
            users,
            token_client,
            providers,
            refresh_threshold_seconds: REFRESH_THRESHOLD_SECONDS,
            gates: RefreshGates::new(),
        }
    }

    /// Override the refresh safety margin (default 300 s).
    #[must_use]
    pub fn with_refresh_threshold(mut self, seconds: i64) -> Self {
        self.refresh_threshold_seconds = seconds;
        self
    }

    /// Return a currently-valid access token for (user, provider),
    /// refreshing through the provider's token endpoint when necessary.
    ///
    /// # Errors
    /// - `NotFound` - the user account does not exist
    /// - `CredentialMissing` - no link exists; the caller must send the
    ///   user through the authorization flow
    /// - `ReauthRequired` - the provider revoked the refresh token; the
    ///   stored credential has been cleared
    /// - `UpstreamUnavailable` - transient provider failure; safe to retry
    #[instrument(skip(self))]
    pub async fn get_valid_access_token(&self, user_id: i64, provider: &str) -> Result<String> {
        self.ensure_user(user_id).await?;

        let record = self.require_linked(user_id, provider).await?;
        if let Some(token) = fresh_token(&record, self.refresh_threshold_seconds) {
            debug!(user_id, provider, "returning cached access token");
            return Ok(token);
        }

        let gate = self.gates.gate(user_id, provider);
        let result = {
            let _guard = gate.lock().await;

            // Re-check after acquiring the gate: a concurrent caller may
            // have completed the refresh while this one waited.
            match self.require_linked(user_id, provider).await {
                Ok(record) => {
                    if let Some(token) = fresh_token(&record, self.refresh_threshold_seconds) {
                        debug!(user_id, provider, "token was refreshed by a concurrent caller");
                        Ok(token)
                    } else {
                        self.refresh(user_id, provider, &record).await
                    }
                }
                Err(err) => Err(err),
            }
        };
        self.gates.release(user_id, provider, &gate);
        result
    }

    /// Complete the authorization-code exchange and store the link.
    ///
    /// The provider must issue a refresh token; without one the account
    /// cannot be kept linked and no credential is stored.
    ///
    /// # Errors
    /// Returns `InvalidInput` when the code is rejected or no refresh
    /// token was issued, `UpstreamUnavailable` on transient failure.
    #[instrument(skip(self, code))]
    pub async fn complete_link(
        &self,
        user_id: i64,
        provider: &str,
        code: &str,
    ) -> Result<CredentialRecord> {
        self.ensure_user(user_id).await?;
        let settings = self.providers.get(provider)?;

        let grant = match self.token_client.exchange_authorization_code(settings, code).await {
            Ok(grant) => grant,
            Err(TokenEndpointError::Rejected { code, .. }) => {
                return Err(CalsyncError::InvalidInput(format!(
                    "authorization code rejected by {provider} ({code})"
                )));
            }
            Err(TokenEndpointError::Unavailable(msg)) => {
                return Err(CalsyncError::UpstreamUnavailable(msg));
            }
        };

        let refresh_token = grant.refresh_token.ok_or_else(|| {
            CalsyncError::InvalidInput(format!(
                "{provider} did not issue a refresh token; revoke the app's access and re-link"
            ))
        })?;

        let record = CredentialRecord::linked(
            user_id,
            provider,
            grant.access_token,
            refresh_token,
            grant.expires_in,
        );
        self.credentials.upsert(&record).await?;

        info!(user_id, provider, "provider account linked");
        Ok(record)
    }

    /// Whether a stored credential with a refresh token exists. No network.
    pub async fn is_linked(&self, user_id: i64, provider: &str) -> Result<bool> {
        Ok(self
            .credentials
            .find(user_id, provider)
            .await?
            .is_some_and(|record| record.is_linked()))
    }

    async fn refresh(
        &self,
        user_id: i64,
        provider: &str,
        record: &CredentialRecord,
    ) -> Result<String> {
        let settings = self.providers.get(provider)?;
        let refresh_token = record.refresh_token.as_deref().ok_or_else(|| {
            CalsyncError::CredentialMissing(format!("no {provider} link for user {user_id}"))
        })?;

        match self.token_client.refresh_access_token(settings, refresh_token).await {
            Ok(grant) => {
                let expires_at = Utc::now() + Duration::seconds(grant.expires_in);
                self.credentials
                    .update_access_token(user_id, provider, &grant.access_token, expires_at)
                    .await?;
                info!(user_id, provider, expires_in = grant.expires_in, "access token refreshed");
                Ok(grant.access_token)
            }
            Err(TokenEndpointError::Rejected { code, description }) if code == INVALID_GRANT => {
                warn!(
                    user_id,
                    provider,
                    description = description.as_deref().unwrap_or(""),
                    "refresh token revoked by provider; clearing stored credential"
                );
                self.credentials.delete(user_id, provider).await?;
                Err(CalsyncError::ReauthRequired(format!(
                    "refresh token no longer honored by {provider}; the account must be re-linked"
                )))
            }
            Err(TokenEndpointError::Rejected { code, .. }) => {
                // Not a revocation signal; the credential stays intact so a
                // later call can retry.
                Err(CalsyncError::UpstreamUnavailable(format!(
                    "token endpoint rejected the request ({code})"
                )))
            }
            Err(TokenEndpointError::Unavailable(msg)) => {
                Err(CalsyncError::UpstreamUnavailable(msg))
            }
        }
    }

    async fn ensure_user(&self, user_id: i64) -> Result<()> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| CalsyncError::NotFound(format!("user not found: {user_id}")))
    }

    async fn require_linked(&self, user_id: i64, provider: &str) -> Result<CredentialRecord> {
        match self.credentials.find(user_id, provider).await? {
            Some(record) if record.is_linked() => Ok(record),
            _ => Err(CalsyncError::CredentialMissing(format!(
                "no {provider} link for user {user_id}"
            ))),
        }
    }
}

#[async_trait]
impl AccessTokenSource for TokenRefreshManager {
    async fn get_valid_access_token(&self, user_id: i64, provider: &str) -> Result<String> {
        Self::get_valid_access_token(self, user_id, provider).await
    }
}

/// Cached token, if it is still valid beyond the safety margin.
fn fresh_token(record: &CredentialRecord, threshold_seconds: i64) -> Option<String> {
    if record.needs_refresh(threshold_seconds) {
        None
    } else {
        record.access_token.clone()
    }
}
