//! Google OAuth token endpoint client.
//!
//! Form-encoded grant exchanges against the provider's token endpoint.
//! Failures are split for the refresh manager: a parsed OAuth error
//! document becomes `Rejected` with its error code; everything else
//! (network, 5xx, malformed bodies) is `Unavailable`.

use std::time::Duration;

use async_trait::async_trait;
use calsync_core::{TokenClient, TokenEndpointError, TokenGrant};
use calsync_domain::constants::PROVIDER_HTTP_TIMEOUT_SECS;
use calsync_domain::{CalsyncError, ProviderSettings, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

/// Token endpoint client for Google-style OAuth providers.
pub struct GoogleTokenClient {
    http: Client,
}

impl GoogleTokenClient {
    /// Build the client with the bounded provider timeout.
    ///
    /// # Errors
    /// Returns `Internal` when the HTTP client cannot be constructed.
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(PROVIDER_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| CalsyncError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    async fn request_token(
        &self,
        endpoint: &str,
        form: &[(&str, &str)],
    ) -> std::result::Result<TokenGrant, TokenEndpointError> {
        let response = self.http.post(endpoint).form(form).send().await.map_err(|e| {
            TokenEndpointError::Unavailable(format!("token endpoint request failed: {e}"))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            TokenEndpointError::Unavailable(format!("failed to read token response: {e}"))
        })?;

        if status.is_success() {
            return parse_grant(&body);
        }

        if status.is_server_error() {
            warn!(%status, "token endpoint server error");
            return Err(TokenEndpointError::Unavailable(format!(
                "token endpoint returned {status}"
            )));
        }

        // 4xx: the provider explains itself in a structured error document.
        // Classification against the revocation code happens in the caller.
        match serde_json::from_str::<OAuthErrorBody>(&body) {
            Ok(error) => {
                debug!(code = %error.error, "token endpoint rejected the request");
                Err(TokenEndpointError::Rejected {
                    code: error.error,
                    description: error.error_description,
                })
            }
            Err(_) => Err(TokenEndpointError::Unavailable(format!(
                "token endpoint returned {status} with an unparseable body"
            ))),
        }
    }
}

fn parse_grant(body: &str) -> std::result::Result<TokenGrant, TokenEndpointError> {
    let parsed: TokenEndpointResponse = serde_json::from_str(body).map_err(|e| {
        TokenEndpointError::Unavailable(format!("malformed token response: {e}"))
    })?;

    let access_token = parsed
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            TokenEndpointError::Unavailable("token response missing access_token".to_string())
        })?;

    Ok(TokenGrant {
        access_token,
        refresh_token: parsed.refresh_token,
        expires_in: parsed.expires_in.unwrap_or(0),
    })
}

#[async_trait]
impl TokenClient for GoogleTokenClient {
    async fn refresh_access_token(
        &self,
        provider: &ProviderSettings,
        refresh_token: &str,
    ) -> std::result::Result<TokenGrant, TokenEndpointError> {
        self.request_token(
            &provider.token_endpoint,
            &[
                ("client_id", provider.client_id.as_str()),
                ("client_secret", provider.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ],
        )
        .await
    }

    async fn exchange_authorization_code(
        &self,
        provider: &ProviderSettings,
        code: &str,
    ) -> std::result::Result<TokenGrant, TokenEndpointError> {
        self.request_token(
            &provider.token_endpoint,
            &[
                ("client_id", provider.client_id.as_str()),
                ("client_secret", provider.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", provider.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ],
        )
        .await
    }
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    error_description: Option<String>,
}
