use crate::credential::OAuthCredential;
use crate::manager::TokenRefresher;
use async_trait::async_trait;
use serde::Deserialize;
use switchyard_core::{SwitchyardError, SwitchyardResult};

/// Standard OAuth2 `refresh_token` grant against a token endpoint.
pub struct OAuthRefresher {
    token_url: String,
    client_id: String,
    client_secret: Option<String>,
    http: reqwest::Client,
}

impl OAuthRefresher {
    /// Creates a refresher for a public client.
    pub fn new(token_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: None,
            http: reqwest::Client::new(),
        }
    }

    /// Sends `client_secret` along with each refresh.
    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    async fn refresh(&self, refresh_token: &str) -> SwitchyardResult<OAuthCredential> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let resp = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| SwitchyardError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SwitchyardError::Auth(format!(
                "Token refresh failed ({status}): {body}"
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| SwitchyardError::Auth(format!("Invalid token response: {e}")))?;

        let mut credential = OAuthCredential::from_token_response(
            token.access_token,
            token.refresh_token,
            token.expires_in,
        )?;
        credential.token_type = token.token_type;
        credential.scope = token.scope;
        Ok(credential)
    }
}
