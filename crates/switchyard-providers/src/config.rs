use crate::account::ProviderAccount;
use crate::reference::ModelReference;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use switchyard_core::{SwitchyardError, SwitchyardResult};

/// Agent id consulted when an agent has no entry of its own.
pub const DEFAULT_AGENT_ID: &str = "default";

/// Model chain for one agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentModelConfig {
    /// First reference tried.
    pub primary: String,
    /// References tried in order after the primary.
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

impl AgentModelConfig {
    /// Primary followed by the fallbacks.
    pub fn chain(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.fallbacks.iter().map(String::as_str))
    }
}

/// Global model chain and router tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouterDefaults {
    /// Primary reference when neither the agent nor `default` is configured.
    #[serde(default)]
    pub primary: String,
    /// Fallbacks paired with `primary`.
    #[serde(default)]
    pub fallbacks: Vec<String>,
    /// Pause between a failed candidate and the next one.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Accepted for compatibility. The router tries every candidate once, so
    /// this does not limit the walk.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Consecutive failures that open an account's circuit.
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,
    /// How long an open circuit stays open.
    #[serde(default = "default_circuit_breaker_reset_ms")]
    pub circuit_breaker_reset_ms: u64,
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_circuit_breaker_threshold() -> u32 {
    3
}

fn default_circuit_breaker_reset_ms() -> u64 {
    60_000
}

impl Default for RouterDefaults {
    fn default() -> Self {
        Self {
            primary: String::new(),
            fallbacks: Vec::new(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retries: default_max_retries(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            circuit_breaker_reset_ms: default_circuit_breaker_reset_ms(),
        }
    }
}

impl RouterDefaults {
    /// Retry delay as a [`Duration`].
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Circuit cooldown as a [`Duration`].
    pub fn circuit_reset(&self) -> Duration {
        Duration::from_millis(self.circuit_breaker_reset_ms)
    }
}

/// Accounts configured for one provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Accounts in declaration order.
    #[serde(default)]
    pub accounts: Vec<ProviderAccount>,
}

/// Static configuration of providers, agents and router defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouterConfig {
    /// Provider id to its accounts.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    /// Agent id to its model chain.
    #[serde(default)]
    pub agents: BTreeMap<String, AgentModelConfig>,
    /// Global chain and tuning.
    #[serde(default)]
    pub defaults: RouterDefaults,
}

impl RouterConfig {
    /// Stamps each account with the provider id of the table it was declared in.
    pub fn normalized(mut self) -> Self {
        for (provider_id, provider) in &mut self.providers {
            for account in &mut provider.accounts {
                account.provider_id.clone_from(provider_id);
            }
        }
        self
    }

    /// All accounts, grouped by provider id in ascending order.
    pub fn accounts(&self) -> impl Iterator<Item = &ProviderAccount> {
        self.providers.values().flat_map(|p| p.accounts.iter())
    }

    /// Chain for `agent_id`, else the `default` agent, else the global defaults.
    pub fn resolve_agent(&self, agent_id: &str) -> AgentModelConfig {
        self.agents
            .get(agent_id)
            .or_else(|| self.agents.get(DEFAULT_AGENT_ID))
            .cloned()
            .unwrap_or_else(|| AgentModelConfig {
                primary: self.defaults.primary.clone(),
                fallbacks: self.defaults.fallbacks.clone(),
            })
    }

    /// Rejects configurations the router cannot act on.
    pub fn validate(&self) -> SwitchyardResult<()> {
        if self.defaults.circuit_breaker_threshold == 0 {
            return Err(SwitchyardError::Config(
                "circuit_breaker_threshold must be at least 1".into(),
            ));
        }

        for (provider_id, provider) in &self.providers {
            let mut seen = HashSet::new();
            for account in &provider.accounts {
                if account.account_id.is_empty() || account.account_id.contains('/') {
                    return Err(SwitchyardError::Config(format!(
                        "Invalid account id \"{}\" for provider {provider_id}",
                        account.account_id
                    )));
                }
                if !seen.insert(account.account_id.as_str()) {
                    return Err(SwitchyardError::Config(format!(
                        "Duplicate account {provider_id}/{}",
                        account.account_id
                    )));
                }
            }
        }

        for (agent_id, agent) in &self.agents {
            for reference in agent.chain() {
                reference.parse::<ModelReference>().map_err(|e| {
                    SwitchyardError::Config(format!("Agent {agent_id}: {e}"))
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample() -> RouterConfig {
        let toml_str = r#"
            [providers.openai]
            accounts = [
                { id = "main", credential_ref = "env:OPENAI_API_KEY", models = ["gpt-4o"] },
                { id = "backup", enabled = false },
            ]

            [providers.anthropic]
            accounts = [{ id = "max", auth_mode = "oauth", models = ["claude-sonnet-4-20250514"] }]

            [agents.default]
            primary = "anthropic/max/claude-sonnet-4-20250514"
            fallbacks = ["openai/main/gpt-4o"]

            [agents.coder]
            primary = "openai/main/gpt-4o"

            [defaults]
            primary = "openai/main/gpt-4o-mini"
            retry_delay_ms = 250
        "#;
        toml::from_str::<RouterConfig>(toml_str).unwrap().normalized()
    }

    #[test]
    fn test_parse_and_normalize() {
        let config = sample();
        let keys: Vec<_> = config.accounts().map(ProviderAccount::key).collect();
        assert_eq!(keys, vec!["anthropic/max", "openai/main", "openai/backup"]);
        assert_eq!(config.defaults.retry_delay_ms, 250);
        assert_eq!(config.defaults.max_retries, 3);
        assert_eq!(config.defaults.circuit_breaker_threshold, 3);
        assert_eq!(config.defaults.circuit_breaker_reset_ms, 60_000);
        config.validate().unwrap();
    }

    #[test]
    fn test_agent_resolution_order() {
        let mut config = sample();
        assert_eq!(config.resolve_agent("coder").primary, "openai/main/gpt-4o");
        assert!(config.resolve_agent("coder").fallbacks.is_empty());

        let unknown = config.resolve_agent("writer");
        assert_eq!(unknown.primary, "anthropic/max/claude-sonnet-4-20250514");
        assert_eq!(unknown.fallbacks, vec!["openai/main/gpt-4o"]);

        config.agents.remove(DEFAULT_AGENT_ID);
        assert_eq!(config.resolve_agent("writer").primary, "openai/main/gpt-4o-mini");
    }

    #[test]
    fn test_validate_rejects_bad_references() {
        let mut config = sample();
        config.agents.insert(
            "broken".into(),
            AgentModelConfig {
                primary: "openai/gpt-4o".into(),
                fallbacks: vec![],
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Agent broken"));
    }

    #[test]
    fn test_validate_rejects_duplicate_accounts() {
        let mut config = sample();
        config
            .providers
            .get_mut("openai")
            .unwrap()
            .accounts
            .push(ProviderAccount::new("openai", "main"));
        assert!(config.validate().is_err());
    }
}
