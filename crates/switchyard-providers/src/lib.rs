//! Provider accounts, backend adapters and the fault-tolerant model router.
//!
//! The [`ModelRouter`] resolves an agent's ordered chain of
//! `provider/account/model` references, skips accounts whose circuit is open,
//! and returns the first backend response it gets.
//!
//! # Main types
//!
//! - [`ProviderAccount`] — One configured account of a provider.
//! - [`ModelReference`] — Parsed `provider/account/model` string.
//! - [`RouterConfig`] — Providers, agent chains and router defaults.
//! - [`LlmBackend`] — Provider-neutral chat trait implemented by each adapter.
//! - [`ProviderRegistry`] — Backend handles keyed by `provider/account`.
//! - [`CircuitBreaker`] — Consecutive-failure tracking per account.
//! - [`ModelRouter`] — Candidate walk with retry delay and circuit checks.

/// Provider account records.
pub mod account;
/// Credential resolution for backend requests.
pub mod auth;
/// Backend adapters.
pub mod backends;
/// Per-account circuit breaker.
pub mod circuit;
/// Router configuration.
pub mod config;
/// Model reference parsing.
pub mod reference;
/// Backend handle registry and built-in factories.
pub mod registry;
/// The model router.
pub mod router;

pub use account::{account_key, AuthMode, ProviderAccount};
pub use auth::{AccountAuth, AuthContext};
pub use backends::anthropic::AnthropicBackend;
pub use backends::gemini::GeminiBackend;
pub use backends::openai::OpenAiBackend;
pub use backends::{LlmBackend, DEFAULT_MAX_OUTPUT_TOKENS};
pub use circuit::{CircuitBreaker, CircuitSnapshot, MAX_COOLDOWN};
pub use config::{AgentModelConfig, ProviderConfig, RouterConfig, RouterDefaults, DEFAULT_AGENT_ID};
pub use reference::ModelReference;
pub use registry::{builtin_factories, ProviderFactory, ProviderRegistry};
pub use router::{classify_error, AccountSummary, ErrorClass, ModelRouter};
