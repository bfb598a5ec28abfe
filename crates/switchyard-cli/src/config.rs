use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use switchyard_agent::AgentLoopConfig;
use switchyard_providers::{AgentModelConfig, ProviderConfig, RouterConfig, RouterDefaults};

/// Contents of `switchyard.toml`.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentModelConfig>,
    #[serde(default)]
    pub defaults: RouterDefaults,
    #[serde(default)]
    pub agent_loop: AgentLoopConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    /// Refresh-token endpoints, keyed by provider id.
    #[serde(default)]
    pub oauth: BTreeMap<String, OAuthClientConfig>,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct SecretsConfig {
    #[serde(default = "default_secrets_path")]
    pub path: PathBuf,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            path: default_secrets_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClientConfig {
    pub token_url: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
}

fn default_secrets_path() -> PathBuf {
    PathBuf::from("./data/secrets.json")
}

fn default_system_prompt() -> String {
    "You are Switchyard, a helpful assistant. Use the available tools when they help \
     answer the user, and keep replies concise."
        .to_string()
}

impl AppConfig {
    pub fn parse(toml_str: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        Self::parse(&raw)
    }

    /// Router section, validated and with provider ids stamped on accounts.
    pub fn router_config(&self) -> anyhow::Result<RouterConfig> {
        let config = RouterConfig {
            providers: self.providers.clone(),
            agents: self.agents.clone(),
            defaults: self.defaults.clone(),
        }
        .normalized();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use switchyard_providers::AuthMode;

    const SAMPLE: &str = r#"
        system_prompt = "Be brief."

        [providers.openrouter]
        accounts = [{ id = "free", credential_ref = "env:OPENROUTER_API_KEY", models = ["meta-llama/llama-3.3-70b-instruct:free"] }]

        [providers.anthropic]
        accounts = [{ id = "max", auth_mode = "oauth" }]

        [agents.default]
        primary = "anthropic/max/claude-sonnet-4-20250514"
        fallbacks = ["openrouter/free/meta-llama/llama-3.3-70b-instruct:free"]

        [defaults]
        retry_delay_ms = 250

        [agent_loop]
        max_tool_calls = 3

        [secrets]
        path = "/var/lib/switchyard/secrets.json"

        [oauth.anthropic]
        token_url = "https://auth.example.com/oauth/token"
        client_id = "switchyard"
    "#;

    #[test]
    fn test_full_config() {
        let config = AppConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.system_prompt, "Be brief.");
        assert_eq!(config.agent_loop.max_tool_calls, 3);
        assert_eq!(config.agent_loop.max_iterations, 10);
        assert_eq!(
            config.secrets.path,
            PathBuf::from("/var/lib/switchyard/secrets.json")
        );
        assert_eq!(config.oauth["anthropic"].client_id, "switchyard");
        assert!(config.oauth["anthropic"].client_secret.is_none());

        let router = config.router_config().unwrap();
        assert_eq!(router.defaults.retry_delay_ms, 250);
        assert_eq!(router.defaults.max_retries, 3);
        let max = router.accounts().next().unwrap();
        assert_eq!(max.provider_id, "anthropic");
        assert_eq!(max.auth_mode, AuthMode::OAuth);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert!(config.providers.is_empty());
        assert_eq!(config.secrets.path, PathBuf::from("./data/secrets.json"));
        assert_eq!(config.agent_loop, AgentLoopConfig::default());
        assert!(config.system_prompt.starts_with("You are Switchyard"));
    }

    #[tokio::test]
    async fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("switchyard.toml");
        tokio::fs::write(&path, SAMPLE).await.unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.providers.len(), 2);

        let err = AppConfig::load(&dir.path().join("missing.toml"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_invalid_router_section_rejected() {
        let config = AppConfig::parse(
            r#"
            [agents.default]
            primary = "openai/gpt-4o"
            "#,
        )
        .unwrap();
        assert!(config.router_config().is_err());
    }
}
