//! Link-flow helpers: consent URL construction and `state` encoding.
//!
//! The HTTP surface that redirects the user and receives the callback is
//! out of scope; these helpers give it the provider consent URL (with the
//! offline-access parameters the refresh flow depends on) and a state
//! value that round-trips the linking user's id.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use calsync_domain::{CalsyncError, ProviderSettings, Result};
use url::Url;

/// Consent URL for the provider's authorization endpoint.
///
/// `access_type=offline` and `prompt=consent` are required for the
/// provider to issue a refresh token on the code exchange.
///
/// # Errors
/// Returns `Config` when the configured authorization endpoint is not a
/// valid URL.
pub fn build_authorize_url(settings: &ProviderSettings, user_id: i64) -> Result<String> {
    let mut url = Url::parse(&settings.authorization_endpoint).map_err(|e| {
        CalsyncError::Config(format!(
            "invalid authorization endpoint '{}': {e}",
            settings.authorization_endpoint
        ))
    })?;

    url.query_pairs_mut()
        .append_pair("client_id", &settings.client_id)
        .append_pair("redirect_uri", &settings.redirect_uri)
        .append_pair("scope", &settings.scope)
        .append_pair("response_type", "code")
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("state", &encode_state(user_id));

    Ok(url.to_string())
}

/// Encode the linking user's id into the OAuth `state` parameter.
#[must_use]
pub fn encode_state(user_id: i64) -> String {
    URL_SAFE_NO_PAD.encode(user_id.to_string())
}

/// Recover the user id from a callback `state` value.
///
/// # Errors
/// Returns `InvalidInput` for values this service did not produce.
pub fn decode_state(state: &str) -> Result<i64> {
    let bytes = URL_SAFE_NO_PAD
        .decode(state)
        .map_err(|e| CalsyncError::InvalidInput(format!("invalid state parameter: {e}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| CalsyncError::InvalidInput(format!("invalid state parameter: {e}")))?;
    text.parse::<i64>()
        .map_err(|e| CalsyncError::InvalidInput(format!("invalid state parameter: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ProviderSettings {
        ProviderSettings::google("client-1", "secret", "http://localhost:8080/callback")
    }

    #[test]
    fn test_state_round_trip() {
        assert_eq!(decode_state(&encode_state(42)).unwrap(), 42);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_state("not-base64!!").is_err());
        assert!(decode_state(&URL_SAFE_NO_PAD.encode("not-a-number")).is_err());
    }

    #[test]
    fn test_authorize_url_carries_offline_access_params() {
        let url = build_authorize_url(&settings(), 7).unwrap();
        let parsed = Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> =
            parsed.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();

        assert!(pairs.contains(&("client_id".into(), "client-1".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("access_type".into(), "offline".into())));
        assert!(pairs.contains(&("prompt".into(), "consent".into())));
        assert!(pairs.contains(&("state".into(), encode_state(7))));
    }
}
