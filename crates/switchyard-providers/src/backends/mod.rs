/// Anthropic Messages API adapter.
pub mod anthropic;
/// Google Gemini `generateContent` adapter.
pub mod gemini;
/// OpenAI-compatible chat completions adapter.
pub mod openai;

use async_trait::async_trait;
use switchyard_core::{ChatMessage, LlmResponse, SwitchyardError, SwitchyardResult, ToolDefinition};

/// `max_tokens` sent when an account does not configure its own.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;

/// Trait for LLM provider backends.
///
/// One handle exists per configured provider account. Each adapter translates
/// the provider-neutral conversation into its wire format and back. Any
/// failure, including a non-success HTTP status, is returned as `Err` with the
/// status code in the message.
///
/// To add a new provider:
/// 1. Create a new module in `backends/`
/// 2. Implement `LlmBackend` for your struct
/// 3. Add a factory for it in `registry::builtin_factories`
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Non-streaming chat completion against `model`.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        model: &str,
    ) -> SwitchyardResult<LlmResponse>;
}

/// Maps a transport failure, tagging timeouts so they classify as retryable.
pub(crate) fn transport_error(e: reqwest::Error) -> SwitchyardError {
    if e.is_timeout() {
        SwitchyardError::Http(format!("Request timeout: {e}"))
    } else {
        SwitchyardError::Http(e.to_string())
    }
}

/// Reads a non-success response into an error carrying its status and body.
pub(crate) async fn status_error(api: &str, resp: reqwest::Response) -> SwitchyardError {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    SwitchyardError::Http(format!("{api} API error {status}: {body}"))
}
