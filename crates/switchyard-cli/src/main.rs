mod config;
mod hooks;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use config::AppConfig;
use std::path::PathBuf;
use std::sync::Arc;
use switchyard_agent::{
    run_agent_loop, AgentLoopDeps, CurrentTimeTool, HookChain, InMemoryPairingService,
    MessageSender, ToolRegistry,
};
use switchyard_auth::{FileSecretStore, OAuthRefresher, SecretStore, TokenManager};
use switchyard_core::{
    ChatOverrides, InboundMessage, OutboundMessage, SwitchyardResult, UserIdentity,
};
use switchyard_providers::{builtin_factories, AuthContext, AuthMode, ModelRouter};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CLI_PLATFORM: &str = "cli";

#[derive(Parser)]
#[command(name = "switchyard", about = "Switchyard — multi-provider model router and agent loop")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "switchyard.toml")]
    config: PathBuf,

    /// Human-readable logs instead of JSON
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured provider accounts
    Accounts,
    /// Manage stored OAuth credentials
    Tokens {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Run one message through the agent loop
    Chat {
        /// Agent whose model chain is used
        #[arg(long, default_value = "default")]
        agent: String,
        /// Model reference tried before the agent's chain (provider/account/model)
        #[arg(long)]
        model: Option<String>,
        /// Message text
        text: String,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// List stored credentials and their expiry
    List,
    /// Delete the stored credential of one account
    Remove { provider: String, account: String },
}

/// Prints replies to stdout.
struct StdoutSender;

#[async_trait]
impl MessageSender for StdoutSender {
    async fn send(&self, message: OutboundMessage) -> SwitchyardResult<()> {
        println!("{}", message.text);
        Ok(())
    }
}

fn init_tracing(pretty: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if pretty {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .pretty()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    }
}

fn token_manager(config: &AppConfig, secrets: Arc<dyn SecretStore>) -> TokenManager {
    let mut tokens = TokenManager::new(secrets);
    for (provider_id, client) in &config.oauth {
        let mut refresher = OAuthRefresher::new(&client.token_url, &client.client_id);
        if let Some(secret) = &client.client_secret {
            refresher = refresher.with_client_secret(secret);
        }
        tokens = tokens.with_refresher(provider_id.clone(), Arc::new(refresher));
        info!(provider = %provider_id, "OAuth refresher registered");
    }
    tokens
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.pretty);

    let config = AppConfig::load(&cli.config).await?;
    let router_config = config.router_config()?;

    let secrets: Arc<dyn SecretStore> =
        Arc::new(FileSecretStore::new(config.secrets.path.clone()).await?);
    let tokens = Arc::new(token_manager(&config, secrets.clone()));

    match cli.command {
        Commands::Accounts => {
            let ctx = AuthContext {
                secrets,
                tokens: tokens.clone(),
            };
            let router = ModelRouter::from_factories(router_config, &builtin_factories(ctx));
            let accounts = router.list_accounts();
            if accounts.is_empty() {
                println!("No provider accounts configured.");
                println!("Add accounts in switchyard.toml under [providers.<id>]");
                return Ok(());
            }
            println!("Provider accounts:");
            for account in &accounts {
                let state = if account.enabled { "enabled" } else { "disabled" };
                let mut line = format!(
                    "  {}/{} [{}, {}]",
                    account.provider, account.account, account.auth_mode, state
                );
                if account.auth_mode == AuthMode::OAuth {
                    let stored = tokens.has_tokens(&account.provider, &account.account).await;
                    line.push_str(if stored { " token stored" } else { " no token" });
                }
                println!("{line}");
                if !account.models.is_empty() {
                    println!("    models: {}", account.models.join(", "));
                }
            }
            println!("\nTotal: {} account(s)", accounts.len());
        }
        Commands::Tokens { action } => match action {
            TokenAction::List => {
                let entries = tokens.list_entries().await?;
                if entries.is_empty() {
                    println!("No OAuth credentials stored.");
                }
                for entry in &entries {
                    let remaining = entry.expires_at - chrono::Utc::now();
                    println!(
                        "  {}/{} expires {} ({} min)",
                        entry.provider_id,
                        entry.account_id,
                        entry.expires_at.to_rfc3339(),
                        remaining.num_minutes()
                    );
                }
            }
            TokenAction::Remove { provider, account } => {
                tokens.remove_tokens(&provider, &account).await?;
                println!("Removed credential for {provider}/{account}");
            }
        },
        Commands::Chat { agent, model, text } => {
            let ctx = AuthContext { secrets, tokens };
            let router = ModelRouter::from_factories(router_config, &builtin_factories(ctx));

            let mut registry = ToolRegistry::new();
            registry.register(Arc::new(CurrentTimeTool::new()))?;

            let user_id = std::env::var("USER").unwrap_or_else(|_| "local".to_string());
            let pairing = InMemoryPairingService::new();
            pairing.pair(&user_id, CLI_PLATFORM, Some(user_id.clone()));

            let mut hook_chain = HookChain::new();
            hook_chain.add(Arc::new(hooks::TracingHook));

            let deps = AgentLoopDeps {
                llm: Arc::new(router),
                tools: Arc::new(registry),
                pairing: Arc::new(pairing),
                sender: Arc::new(StdoutSender),
                hooks: hook_chain,
                config: config.agent_loop.clone(),
                system_prompt: config.system_prompt.clone(),
                agent_id: Some(agent),
            };

            let inbound = InboundMessage {
                id: uuid::Uuid::new_v4().to_string(),
                channel_id: CLI_PLATFORM.to_string(),
                sender: UserIdentity::new(user_id, CLI_PLATFORM),
                text,
                timestamp: chrono::Utc::now(),
                overrides: model.map(|model| ChatOverrides {
                    model: Some(model),
                    ..Default::default()
                }),
            };

            let result = run_agent_loop(&inbound, &deps).await;
            info!(
                iterations = result.iterations,
                tool_calls = result.tool_calls_total,
                "Chat finished"
            );
            if let Some(reason) = result.abort_reason {
                warn!(reason = %reason, "Agent loop aborted");
                anyhow::bail!("agent loop aborted: {reason}");
            }
        }
    }

    Ok(())
}
