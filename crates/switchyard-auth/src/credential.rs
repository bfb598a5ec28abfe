use chrono::{DateTime, Duration, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use switchyard_core::{SwitchyardError, SwitchyardResult};

/// Default access-token lifetime when a token response omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// OAuth2 credentials for one provider account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthCredential {
    /// Bearer token for API requests.
    pub access_token: String,
    /// Token for obtaining a new access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry of `access_token`.
    pub expires_at: DateTime<Utc>,
    /// Token type (usually "Bearer").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Scopes granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl OAuthCredential {
    /// Builds a credential from a token-endpoint response.
    ///
    /// Fails with [`SwitchyardError::Auth`] when `expires_in` does not fit a timestamp.
    pub fn from_token_response(
        access_token: String,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) -> SwitchyardResult<Self> {
        let expires_in = expires_in_secs.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_at = TimeDelta::try_seconds(expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                SwitchyardError::Auth(format!(
                    "Token expiry out of range: expires_in={expires_in}"
                ))
            })?;
        Ok(Self {
            access_token,
            refresh_token,
            expires_at,
            token_type: None,
            scope: None,
        })
    }

    /// True unless the token stays valid for more than `buffer` from now.
    pub fn expires_within(&self, buffer: Duration) -> bool {
        match Utc::now().checked_add_signed(buffer) {
            Some(deadline) => deadline >= self.expires_at,
            None => true,
        }
    }
}

/// Status view of a stored credential. Carries no token material.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TokenEntry {
    /// Provider id.
    pub provider_id: String,
    /// Account id within the provider.
    pub account_id: String,
    /// Expiry of the stored access token.
    pub expires_at: DateTime<Utc>,
}
