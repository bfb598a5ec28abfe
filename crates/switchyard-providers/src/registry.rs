use crate::account::ProviderAccount;
use crate::auth::{AccountAuth, AuthContext};
use crate::backends::anthropic::AnthropicBackend;
use crate::backends::gemini::GeminiBackend;
use crate::backends::openai::OpenAiBackend;
use crate::backends::LlmBackend;
use crate::config::RouterConfig;
use std::collections::HashMap;
use std::sync::Arc;
use switchyard_core::{SwitchyardError, SwitchyardResult};
use tracing::{error, info, warn};

/// Builds a backend handle for one account.
pub type ProviderFactory =
    Arc<dyn Fn(&ProviderAccount) -> SwitchyardResult<Arc<dyn LlmBackend>> + Send + Sync>;

/// Provider ids served by the OpenAI-compatible adapter.
pub const OPENAI_COMPATIBLE_PROVIDERS: &[&str] =
    &["openai", "groq", "openrouter", "kimi", "github-copilot"];

/// Backend handles keyed by `provider/account`.
///
/// Built once from configuration and read-only afterwards.
#[derive(Default)]
pub struct ProviderRegistry {
    handles: HashMap<String, Arc<dyn LlmBackend>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiates a handle for every enabled account that has a factory.
    ///
    /// Accounts without a factory, disabled accounts and accounts whose
    /// factory fails are logged and left out.
    pub fn build(config: &RouterConfig, factories: &HashMap<String, ProviderFactory>) -> Self {
        let mut registry = Self::new();

        for (provider_id, provider) in &config.providers {
            let Some(factory) = factories.get(provider_id) else {
                warn!(provider = %provider_id, "No factory registered for provider, skipping");
                continue;
            };

            for account in &provider.accounts {
                let account = ProviderAccount {
                    provider_id: provider_id.clone(),
                    ..account.clone()
                };
                if !account.enabled {
                    info!(provider = %provider_id, account = %account.account_id, "Account disabled, skipping");
                    continue;
                }

                match factory(&account) {
                    Ok(handle) => {
                        info!(
                            provider = %provider_id,
                            account = %account.account_id,
                            models = ?account.models,
                            "Provider account registered"
                        );
                        registry.register(account.key(), handle);
                    }
                    Err(e) => {
                        error!(provider = %provider_id, account = %account.account_id, error = %e, "Failed to create provider");
                    }
                }
            }
        }

        registry
    }

    /// Registers a handle under `key`, replacing any previous one.
    pub fn register(&mut self, key: impl Into<String>, handle: Arc<dyn LlmBackend>) {
        self.handles.insert(key.into(), handle);
    }

    /// Returns the handle for `key` (`provider/account`).
    pub fn get(&self, key: &str) -> Option<Arc<dyn LlmBackend>> {
        self.handles.get(key).cloned()
    }

    /// Whether a handle is registered for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.handles.contains_key(key)
    }

    /// Registered keys in ascending order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.handles.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of registered handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no handle is registered.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

fn check_endpoint(account: &ProviderAccount) -> SwitchyardResult<()> {
    if let Some(endpoint) = &account.endpoint_override {
        let url = reqwest::Url::parse(endpoint).map_err(|e| {
            SwitchyardError::Config(format!("Invalid endpoint_override \"{endpoint}\": {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SwitchyardError::Config(format!(
                "Unsupported endpoint scheme \"{}\"",
                url.scheme()
            )));
        }
    }
    Ok(())
}

/// Factories for the built-in adapters, sharing `ctx` for credentials.
pub fn builtin_factories(ctx: AuthContext) -> HashMap<String, ProviderFactory> {
    let mut factories: HashMap<String, ProviderFactory> = HashMap::new();

    for provider_id in OPENAI_COMPATIBLE_PROVIDERS {
        let ctx = ctx.clone();
        factories.insert(
            (*provider_id).to_string(),
            Arc::new(move |account: &ProviderAccount| -> SwitchyardResult<Arc<dyn LlmBackend>> {
                check_endpoint(account)?;
                let auth = AccountAuth::new(account, ctx.clone());
                Ok(Arc::new(OpenAiBackend::new(account, auth)))
            }),
        );
    }

    let anthropic_ctx = ctx.clone();
    factories.insert(
        "anthropic".to_string(),
        Arc::new(move |account: &ProviderAccount| -> SwitchyardResult<Arc<dyn LlmBackend>> {
            check_endpoint(account)?;
            let auth = AccountAuth::new(account, anthropic_ctx.clone());
            Ok(Arc::new(AnthropicBackend::new(account, auth)))
        }),
    );

    factories.insert(
        "gemini".to_string(),
        Arc::new(move |account: &ProviderAccount| -> SwitchyardResult<Arc<dyn LlmBackend>> {
            check_endpoint(account)?;
            let auth = AccountAuth::new(account, ctx.clone());
            Ok(Arc::new(GeminiBackend::new(account, auth)))
        }),
    );

    factories
}
