//! Stored OAuth credentials for one (user, provider) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persistent record of the access/refresh token pair for one user and one
/// provider.
///
/// A record with a refresh token is considered *linked*. The access token
/// and expiry may be stale; callers must refresh before use when
/// [`needs_refresh`](Self::needs_refresh) reports true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub user_id: i64,
    pub provider: String,

    /// Current access token, if one has been obtained.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Long-lived refresh token. Present iff the account is linked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Absolute access-token expiration timestamp (UTC).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Create a freshly linked record from a token grant.
    ///
    /// # Arguments
    /// * `expires_in` - Access-token lifetime in seconds, as returned by the
    ///   provider's token endpoint.
    #[must_use]
    pub fn linked(
        user_id: i64,
        provider: impl Into<String>,
        access_token: String,
        refresh_token: String,
        expires_in: i64,
    ) -> Self {
        let now = Utc::now();
        let expires_at =
            (expires_in > 0).then(|| now + chrono::Duration::seconds(expires_in));

        Self {
            user_id,
            provider: provider.into(),
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            expires_at,
            updated_at: now,
        }
    }

    /// Whether this record holds a refresh token.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Whether the access token must be refreshed before use.
    ///
    /// True when there is no cached token, no recorded expiry, or the
    /// expiry is in the past or within `threshold_seconds` of now. A
    /// missing expiry is treated as stale: the token cannot be trusted
    /// without a round trip.
    #[must_use]
    pub fn needs_refresh(&self, threshold_seconds: i64) -> bool {
        if self.access_token.is_none() {
            return true;
        }
        match self.expires_at {
            Some(expires_at) => {
                Utc::now() + chrono::Duration::seconds(threshold_seconds) >= expires_at
            }
            None => true,
        }
    }

    /// Seconds until the access token expires, if an expiry is recorded.
    #[must_use]
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - Utc::now()).num_seconds())
    }
}
