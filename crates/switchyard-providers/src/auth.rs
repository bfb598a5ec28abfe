use crate::account::{AuthMode, ProviderAccount};
use std::sync::Arc;
use switchyard_auth::{SecretStore, TokenManager};
use switchyard_core::{SwitchyardError, SwitchyardResult};

/// Prefix of a `credential_ref` naming an environment variable.
pub const ENV_REF_PREFIX: &str = "env:";

/// Shared credential sources handed to backend factories.
#[derive(Clone)]
pub struct AuthContext {
    /// Store consulted for secret-id credential references.
    pub secrets: Arc<dyn SecretStore>,
    /// Manager consulted for OAuth accounts.
    pub tokens: Arc<TokenManager>,
}

/// Per-account credential resolver used by backend adapters on every request.
#[derive(Clone)]
pub struct AccountAuth {
    provider_id: String,
    account_id: String,
    mode: AuthMode,
    credential_ref: Option<String>,
    ctx: AuthContext,
}

impl AccountAuth {
    /// Binds `account`'s auth settings to `ctx`.
    pub fn new(account: &ProviderAccount, ctx: AuthContext) -> Self {
        Self {
            provider_id: account.provider_id.clone(),
            account_id: account.account_id.clone(),
            mode: account.auth_mode,
            credential_ref: account.credential_ref.clone(),
            ctx,
        }
    }

    /// The account's auth mode.
    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Resolves the credential to send. `None` means the endpoint takes no auth.
    pub async fn resolve(&self) -> SwitchyardResult<Option<String>> {
        match self.mode {
            AuthMode::OAuth => self
                .ctx
                .tokens
                .get_access_token(&self.provider_id, &self.account_id)
                .await
                .map(Some)
                .ok_or_else(|| {
                    SwitchyardError::Auth(format!(
                        "No valid OAuth token for {}/{}",
                        self.provider_id, self.account_id
                    ))
                }),
            AuthMode::ApiKey => match &self.credential_ref {
                None => Ok(None),
                Some(reference) => self.resolve_api_key(reference).await.map(Some),
            },
        }
    }

    async fn resolve_api_key(&self, reference: &str) -> SwitchyardResult<String> {
        if let Some(var) = reference.strip_prefix(ENV_REF_PREFIX) {
            return std::env::var(var).map_err(|_| {
                SwitchyardError::Auth(format!(
                    "Environment variable {var} not set for {}/{}",
                    self.provider_id, self.account_id
                ))
            });
        }
        self.ctx.secrets.get(reference).await?.ok_or_else(|| {
            SwitchyardError::Auth(format!(
                "Secret \"{reference}\" not found for {}/{}",
                self.provider_id, self.account_id
            ))
        })
    }
}
