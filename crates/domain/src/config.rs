//! Provider configuration structures
//!
//! Per-provider OAuth settings (endpoints, client credentials, scopes) and
//! the registry the token layer resolves providers from. Loading these from
//! files/environment is an infrastructure concern.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::PROVIDER_GOOGLE;
use crate::errors::{CalsyncError, Result};

/// OAuth settings for one calendar provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub provider: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    /// Space-separated scope string, sent verbatim in the consent request.
    pub scope: String,
    pub redirect_uri: String,
}

impl ProviderSettings {
    /// Google settings with the standard endpoints and calendar scope.
    #[must_use]
    pub fn google(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            provider: PROVIDER_GOOGLE.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authorization_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
            scope: "https://www.googleapis.com/auth/calendar openid email".to_string(),
            redirect_uri: redirect_uri.into(),
        }
    }
}

/// Registry of configured providers, keyed by provider identifier.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderSettings>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, settings: ProviderSettings) {
        self.providers.insert(settings.provider.clone(), settings);
    }

    /// Resolve settings for a provider identifier.
    ///
    /// # Errors
    /// Returns `Config` when the provider is not configured.
    pub fn get(&self, provider: &str) -> Result<&ProviderSettings> {
        self.providers
            .get(provider)
            .ok_or_else(|| CalsyncError::Config(format!("provider not configured: {provider}")))
    }

    #[must_use]
    pub fn contains(&self, provider: &str) -> bool {
        self.providers.contains_key(provider)
    }
}
