use crate::account::AuthMode;
use crate::circuit::{CircuitBreaker, CircuitSnapshot};
use crate::config::{AgentModelConfig, RouterConfig};
use crate::reference::ModelReference;
use crate::registry::{ProviderFactory, ProviderRegistry};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use switchyard_core::{
    ChatMessage, ChatOverrides, LlmResponse, SwitchyardError, SwitchyardResult, ToolDefinition,
};
use tracing::{debug, error, info, warn};

/// Type alias for the injectable sleep function used in tests.
#[cfg(test)]
type SleepFn = Box<
    dyn Fn(u64) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + Sync,
>;

/// Whether a backend failure is likely transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rate limit, 5xx, timeout, overload or connection reset.
    Retryable,
    /// Anything else (auth, validation, malformed request).
    Fatal,
}

impl ErrorClass {
    /// Lowercase name for log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retryable => "retryable",
            Self::Fatal => "fatal",
        }
    }
}

const RETRYABLE_MARKERS: &[&str] = &[
    "429",
    "rate limit",
    "500",
    "502",
    "503",
    "504",
    "529",
    "timeout",
    "timed out",
    "econnreset",
    "connection reset",
    "overloaded",
    "circuit open",
];

/// Classifies an error by markers in its message.
///
/// Both classes fall through to the next candidate; the class only shapes
/// logging.
pub fn classify_error(err: &SwitchyardError) -> ErrorClass {
    let lower = err.to_string().to_lowercase();
    if RETRYABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        ErrorClass::Retryable
    } else {
        ErrorClass::Fatal
    }
}

/// One configured account as reported by [`ModelRouter::list_accounts`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccountSummary {
    /// Provider id.
    pub provider: String,
    /// Account id.
    pub account: String,
    /// Configured models.
    pub models: Vec<String>,
    /// Whether the account is enabled.
    pub enabled: bool,
    /// Authentication mode.
    pub auth_mode: AuthMode,
}

/// Resolves an agent's model chain and walks it until one backend answers.
///
/// For each candidate reference in order: malformed references, accounts
/// without a registered handle and accounts with an open circuit are skipped
/// without delay. A backend failure is counted against the account's circuit
/// and followed by the retry delay, unless it was the last candidate. Every
/// candidate is tried until one succeeds or the list is exhausted.
pub struct ModelRouter {
    config: RouterConfig,
    registry: ProviderRegistry,
    breaker: CircuitBreaker,
    /// Injectable sleep function for testing (allows skipping real delays).
    #[cfg(test)]
    sleep_fn: Option<SleepFn>,
}

impl ModelRouter {
    /// Creates a router over an already-built registry.
    pub fn new(config: RouterConfig, registry: ProviderRegistry) -> Self {
        let breaker = CircuitBreaker::new(
            config.defaults.circuit_breaker_threshold,
            config.defaults.circuit_reset(),
        );
        Self {
            config,
            registry,
            breaker,
            #[cfg(test)]
            sleep_fn: None,
        }
    }

    /// Builds the registry from `factories` and creates a router over it.
    pub fn from_factories(config: RouterConfig, factories: &HashMap<String, ProviderFactory>) -> Self {
        let config = config.normalized();
        let registry = ProviderRegistry::build(&config, factories);
        Self::new(config, registry)
    }

    /// Perform a sleep for the given duration.
    async fn do_sleep(&self, delay: Duration) {
        #[cfg(test)]
        if let Some(ref f) = self.sleep_fn {
            f(delay.as_millis() as u64).await;
            return;
        }
        tokio::time::sleep(delay).await;
    }

    /// Model chain for `agent_id`, falling back to `default`, then global defaults.
    pub fn agent_config(&self, agent_id: &str) -> AgentModelConfig {
        self.config.resolve_agent(agent_id)
    }

    /// Candidate references in the order they will be tried.
    pub fn candidates(&self, agent_id: &str, overrides: Option<&ChatOverrides>) -> Vec<String> {
        let agent = self.agent_config(agent_id);
        overrides
            .and_then(|o| o.model.clone())
            .into_iter()
            .chain(std::iter::once(agent.primary))
            .chain(agent.fallbacks)
            .collect()
    }

    /// Every configured account, enabled or not, registered or not.
    pub fn list_accounts(&self) -> Vec<AccountSummary> {
        self.config
            .providers
            .iter()
            .flat_map(|(provider_id, provider)| {
                provider.accounts.iter().map(move |account| AccountSummary {
                    provider: provider_id.clone(),
                    account: account.account_id.clone(),
                    models: account.models.clone(),
                    enabled: account.enabled,
                    auth_mode: account.auth_mode,
                })
            })
            .collect()
    }

    /// Current circuit state of every account that has failed at least once.
    pub fn circuit_snapshot(&self) -> Vec<CircuitSnapshot> {
        self.breaker.snapshot()
    }

    /// Sends the conversation to the first healthy candidate that answers.
    pub async fn chat(
        &self,
        agent_id: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        overrides: Option<&ChatOverrides>,
    ) -> SwitchyardResult<LlmResponse> {
        let candidates = self.candidates(agent_id, overrides);
        let retry_delay = self.config.defaults.retry_delay();

        if let Some(o) = overrides {
            if o.reasoning.is_some() || o.thinking.is_some() {
                debug!(
                    agent = agent_id,
                    reasoning = ?o.reasoning,
                    thinking = ?o.thinking,
                    "Reasoning overrides requested"
                );
            }
        }

        let mut last_error: Option<String> = None;

        for (i, raw) in candidates.iter().enumerate() {
            let is_last = i + 1 == candidates.len();

            let reference: ModelReference = match raw.parse() {
                Ok(r) => r,
                Err(e) => {
                    error!(reference = %raw, error = %e, "Invalid model ref, skipping");
                    continue;
                }
            };
            let key = reference.account_key();

            let Some(handle) = self.registry.get(&key) else {
                let e = SwitchyardError::NoProvider(key);
                warn!(reference = %raw, error = %e, "Candidate unavailable, skipping");
                last_error = Some(e.to_string());
                continue;
            };

            if self.breaker.is_open(&key) {
                let e = SwitchyardError::CircuitOpen(key);
                debug!(reference = %raw, error = %e, "Skipping candidate");
                last_error = Some(e.to_string());
                continue;
            }

            debug!(
                reference = %raw,
                attempt = i + 1,
                total = candidates.len(),
                "{}",
                if i == 0 { "Trying primary model" } else { "Trying fallback model" }
            );

            match handle.chat(messages, tools, &reference.model).await {
                Ok(response) => {
                    self.breaker.record_success(&key);
                    if i > 0 {
                        info!(reference = %raw, attempt = i + 1, "Fallback model succeeded");
                    }
                    return Ok(response);
                }
                Err(e) => {
                    self.breaker.record_failure(&key);
                    let class = classify_error(&e);
                    warn!(
                        reference = %raw,
                        attempt = i + 1,
                        class = class.as_str(),
                        error = %e,
                        "{}",
                        if i == 0 { "Primary model failed" } else { "Fallback model failed" }
                    );
                    last_error = Some(e.to_string());

                    if !is_last && !retry_delay.is_zero() {
                        self.do_sleep(retry_delay).await;
                    }
                }
            }
        }

        Err(SwitchyardError::AllCandidatesExhausted {
            last_error: last_error.unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
