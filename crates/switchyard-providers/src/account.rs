use serde::{Deserialize, Serialize};

/// How an account authenticates against its provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthMode {
    /// Static API key resolved from `credential_ref`.
    #[default]
    #[serde(rename = "api_key")]
    ApiKey,
    /// OAuth access token managed by the token manager.
    #[serde(rename = "oauth")]
    OAuth,
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey => write!(f, "api_key"),
            Self::OAuth => write!(f, "oauth"),
        }
    }
}

/// One configured account of a provider. Identifies exactly one backend handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderAccount {
    /// Account id, unique within its provider (e.g. `main`, `backup`).
    #[serde(rename = "id")]
    pub account_id: String,
    /// Provider id. Filled from the enclosing `[providers.<id>]` table.
    #[serde(default)]
    pub provider_id: String,
    /// Authentication mode.
    #[serde(default)]
    pub auth_mode: AuthMode,
    /// `env:NAME` or a secret-store id holding the API key.
    #[serde(default)]
    pub credential_ref: Option<String>,
    /// Models available through this account, in preference order.
    #[serde(default)]
    pub models: Vec<String>,
    /// Disabled accounts are listed but never get a backend handle.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Custom base URL (OpenAI-compatible proxies, self-hosted gateways).
    #[serde(default)]
    pub endpoint_override: Option<String>,
    /// Per-account `max_tokens` for responses.
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

fn default_enabled() -> bool {
    true
}

impl ProviderAccount {
    /// Creates an enabled API-key account with no models.
    pub fn new(provider_id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            provider_id: provider_id.into(),
            auth_mode: AuthMode::ApiKey,
            credential_ref: None,
            models: Vec::new(),
            enabled: true,
            endpoint_override: None,
            max_output_tokens: None,
        }
    }

    /// Registry and circuit key: `provider/account`.
    pub fn key(&self) -> String {
        account_key(&self.provider_id, &self.account_id)
    }
}

/// Joins a provider id and account id into a registry key.
pub fn account_key(provider_id: &str, account_id: &str) -> String {
    format!("{provider_id}/{account_id}")
}
