//! Provider settings loading.
//!
//! Settings come from a TOML file (`[providers.<name>]` tables) with
//! environment-variable overrides for the Google credentials, so deploys
//! can keep secrets out of the file.

use std::collections::HashMap;
use std::path::Path;

use calsync_domain::constants::PROVIDER_GOOGLE;
use calsync_domain::{CalsyncError, ProviderRegistry, ProviderSettings, Result};
use serde::Deserialize;
use tracing::{debug, info};

const ENV_GOOGLE_CLIENT_ID: &str = "CALSYNC_GOOGLE_CLIENT_ID";
const ENV_GOOGLE_CLIENT_SECRET: &str = "CALSYNC_GOOGLE_CLIENT_SECRET";
const ENV_GOOGLE_REDIRECT_URI: &str = "CALSYNC_GOOGLE_REDIRECT_URI";

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    providers: HashMap<String, RawProvider>,
}

#[derive(Debug, Deserialize)]
struct RawProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    authorization_endpoint: Option<String>,
    token_endpoint: Option<String>,
    scope: Option<String>,
}

/// Load the registry from a TOML file, then apply environment overrides.
///
/// # Errors
/// Returns `Config` when the file is unreadable or malformed.
pub fn load(path: &Path) -> Result<ProviderRegistry> {
    let mut registry = load_from_file(path)?;
    apply_env_overrides(&mut registry);
    Ok(registry)
}

/// Load the registry from a TOML file.
///
/// # Errors
/// Returns `Config` when the file is unreadable or malformed.
pub fn load_from_file(path: &Path) -> Result<ProviderRegistry> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        CalsyncError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let registry = parse_toml(&contents)?;
    info!(path = %path.display(), "provider settings loaded");
    Ok(registry)
}

/// Build a registry purely from environment variables.
///
/// # Errors
/// Returns `Config` when the Google client id/secret are not set.
pub fn load_from_env() -> Result<ProviderRegistry> {
    let client_id = require_env(ENV_GOOGLE_CLIENT_ID)?;
    let client_secret = require_env(ENV_GOOGLE_CLIENT_SECRET)?;
    let redirect_uri = std::env::var(ENV_GOOGLE_REDIRECT_URI)
        .unwrap_or_else(|_| "http://localhost:8080/oauth/callback".to_string());

    let mut registry = ProviderRegistry::new();
    registry.register(ProviderSettings::google(client_id, client_secret, redirect_uri));
    Ok(registry)
}

fn parse_toml(contents: &str) -> Result<ProviderRegistry> {
    let raw: RawConfig = toml::from_str(contents)
        .map_err(|e| CalsyncError::Config(format!("malformed provider config: {e}")))?;

    let mut registry = ProviderRegistry::new();
    for (name, provider) in raw.providers {
        let mut settings = if name == PROVIDER_GOOGLE {
            ProviderSettings::google(
                provider.client_id,
                provider.client_secret,
                provider.redirect_uri,
            )
        } else {
            // Non-Google providers must spell out their endpoints.
            let authorization_endpoint = provider.authorization_endpoint.clone().ok_or_else(
                || CalsyncError::Config(format!("provider {name} missing authorization_endpoint")),
            )?;
            let token_endpoint = provider.token_endpoint.clone().ok_or_else(|| {
                CalsyncError::Config(format!("provider {name} missing token_endpoint"))
            })?;
            let scope = provider.scope.clone().ok_or_else(|| {
                CalsyncError::Config(format!("provider {name} missing scope"))
            })?;
            ProviderSettings {
                provider: name.clone(),
                client_id: provider.client_id,
                client_secret: provider.client_secret,
                authorization_endpoint,
                token_endpoint,
                scope,
                redirect_uri: provider.redirect_uri,
            }
        };

        // Explicit endpoint/scope entries beat the built-in defaults.
        if let Some(endpoint) = provider.authorization_endpoint {
            settings.authorization_endpoint = endpoint;
        }
        if let Some(endpoint) = provider.token_endpoint {
            settings.token_endpoint = endpoint;
        }
        if let Some(scope) = provider.scope {
            settings.scope = scope;
        }

        debug!(provider = %settings.provider, "provider registered");
        registry.register(settings);
    }

    Ok(registry)
}

fn apply_env_overrides(registry: &mut ProviderRegistry) {
    let client_id = std::env::var(ENV_GOOGLE_CLIENT_ID).ok();
    let client_secret = std::env::var(ENV_GOOGLE_CLIENT_SECRET).ok();
    let redirect_uri = std::env::var(ENV_GOOGLE_REDIRECT_URI).ok();

    if client_id.is_none() && client_secret.is_none() && redirect_uri.is_none() {
        return;
    }

    let mut settings = registry
        .get(PROVIDER_GOOGLE)
        .cloned()
        .unwrap_or_else(|_| ProviderSettings::google("", "", ""));

    if let Some(value) = client_id {
        settings.client_id = value;
    }
    if let Some(value) = client_secret {
        settings.client_secret = value;
    }
    if let Some(value) = redirect_uri {
        settings.redirect_uri = value;
    }

    registry.register(settings);
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| CalsyncError::Config(format!("{name} not set")))
}
