//! OAuth credential lifecycle: storage, expiry checks and refresh.
//!
//! Credentials live in a [`SecretStore`] as JSON blobs keyed by
//! `oauth-token:<provider_id>:<account_id>`. [`TokenManager::get_access_token`]
//! hands out the cached access token while it is comfortably valid and
//! refreshes it through the provider's [`TokenRefresher`] otherwise. A missing
//! or unusable credential is reported as `None`, never as an error.

use crate::credential::{OAuthCredential, TokenEntry};
use crate::store::SecretStore;
use async_trait::async_trait;
use chrono::Duration;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use switchyard_core::SwitchyardResult;
use tracing::{error, info, warn};

/// Prefix of every credential key in the secret store.
pub const TOKEN_KEY_PREFIX: &str = "oauth-token:";

/// Seconds before expiry at which a token is considered stale.
pub const REFRESH_BUFFER_SECS: i64 = 60;

/// Exchanges a refresh token for a new credential.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Performs the refresh. The returned credential may omit the refresh token.
    async fn refresh(&self, refresh_token: &str) -> SwitchyardResult<OAuthCredential>;
}

/// Secret-store key for a provider account's credential.
pub fn token_key(provider_id: &str, account_id: &str) -> String {
    format!("{TOKEN_KEY_PREFIX}{provider_id}:{account_id}")
}

/// Keeps per-account OAuth credentials fresh.
pub struct TokenManager {
    store: Arc<dyn SecretStore>,
    refreshers: HashMap<String, Arc<dyn TokenRefresher>>,
    refresh_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    buffer: Duration,
}

impl TokenManager {
    /// Creates a manager over `store` with no refreshers registered.
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            refreshers: HashMap::new(),
            refresh_locks: Mutex::new(HashMap::new()),
            buffer: Duration::seconds(REFRESH_BUFFER_SECS),
        }
    }

    /// Registers the refresh function for `provider_id`.
    pub fn with_refresher(
        mut self,
        provider_id: impl Into<String>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        self.refreshers.insert(provider_id.into(), refresher);
        self
    }

    /// Returns a usable access token, refreshing it if it is about to expire.
    ///
    /// Refreshes for the same account are serialized: a caller that waited on
    /// another caller's refresh re-reads the store and reuses the new token.
    pub async fn get_access_token(&self, provider_id: &str, account_id: &str) -> Option<String> {
        let tokens = self.load(provider_id, account_id).await?;
        if !tokens.expires_within(self.buffer) {
            return Some(tokens.access_token);
        }

        let lock = self.refresh_lock(provider_id, account_id);
        let _guard = lock.lock().await;

        // Another task may have refreshed while we waited.
        let tokens = self.load(provider_id, account_id).await?;
        if !tokens.expires_within(self.buffer) {
            return Some(tokens.access_token);
        }

        let Some(refresh_token) = tokens.refresh_token.clone() else {
            warn!(
                provider = provider_id,
                account = account_id,
                "Token expired, no refresh token, removing"
            );
            self.evict(provider_id, account_id).await;
            return None;
        };

        let Some(refresher) = self.refreshers.get(provider_id) else {
            warn!(provider = provider_id, "No refresh function registered, token expired");
            return None;
        };

        info!(provider = provider_id, account = account_id, "Refreshing OAuth token");
        let mut fresh = match refresher.refresh(&refresh_token).await {
            Ok(fresh) => fresh,
            Err(e) => {
                error!(provider = provider_id, account = account_id, error = %e, "Token refresh failed");
                return None;
            }
        };
        if fresh.refresh_token.is_none() {
            fresh.refresh_token = Some(refresh_token);
        }

        if let Err(e) = self.save(provider_id, account_id, &fresh).await {
            error!(provider = provider_id, account = account_id, error = %e, "Failed to persist refreshed token");
            return None;
        }
        Some(fresh.access_token)
    }

    /// Stores `tokens` for the account, replacing whatever was there.
    pub async fn store_tokens(
        &self,
        provider_id: &str,
        account_id: &str,
        tokens: &OAuthCredential,
    ) -> SwitchyardResult<()> {
        self.save(provider_id, account_id, tokens).await?;
        info!(
            provider = provider_id,
            account = account_id,
            expires_at = %tokens.expires_at.to_rfc3339(),
            "OAuth tokens stored"
        );
        Ok(())
    }

    /// Whether a readable credential is stored for the account.
    pub async fn has_tokens(&self, provider_id: &str, account_id: &str) -> bool {
        self.load(provider_id, account_id).await.is_some()
    }

    /// Deletes the account's credential (e.g. on logout).
    pub async fn remove_tokens(&self, provider_id: &str, account_id: &str) -> SwitchyardResult<()> {
        self.store.delete(&token_key(provider_id, account_id)).await?;
        info!(provider = provider_id, account = account_id, "OAuth tokens removed");
        Ok(())
    }

    /// Lists every stored credential's account and expiry.
    pub async fn list_entries(&self) -> SwitchyardResult<Vec<TokenEntry>> {
        let mut entries = Vec::new();
        for key in self.store.list().await? {
            let Some(rest) = key.strip_prefix(TOKEN_KEY_PREFIX) else {
                continue;
            };
            let Some((provider_id, account_id)) = rest.split_once(':') else {
                continue;
            };
            if provider_id.is_empty() || account_id.is_empty() {
                continue;
            }
            if let Some(tokens) = self.load(provider_id, account_id).await {
                entries.push(TokenEntry {
                    provider_id: provider_id.to_string(),
                    account_id: account_id.to_string(),
                    expires_at: tokens.expires_at,
                });
            }
        }
        Ok(entries)
    }

    fn refresh_lock(&self, provider_id: &str, account_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.refresh_locks
            .lock()
            .entry(token_key(provider_id, account_id))
            .or_default()
            .clone()
    }

    /// Reads and decodes a credential. Corrupted records are removed.
    async fn load(&self, provider_id: &str, account_id: &str) -> Option<OAuthCredential> {
        let key = token_key(provider_id, account_id);
        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(provider = provider_id, account = account_id, error = %e, "Secret store read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(tokens) => Some(tokens),
            Err(_) => {
                warn!(provider = provider_id, account = account_id, "Corrupted token data, removing");
                self.evict(provider_id, account_id).await;
                None
            }
        }
    }

    async fn save(
        &self,
        provider_id: &str,
        account_id: &str,
        tokens: &OAuthCredential,
    ) -> SwitchyardResult<()> {
        let json = serde_json::to_string(tokens)?;
        self.store.set(&token_key(provider_id, account_id), &json).await
    }

    async fn evict(&self, provider_id: &str, account_id: &str) {
        if let Err(e) = self.store.delete(&token_key(provider_id, account_id)).await {
            warn!(provider = provider_id, account = account_id, error = %e, "Failed to evict token");
        }
    }
}
