use super::{status_error, transport_error, LlmBackend, DEFAULT_MAX_OUTPUT_TOKENS};
use crate::account::ProviderAccount;
use crate::auth::AccountAuth;
use async_trait::async_trait;
use switchyard_core::{
    ChatMessage, LlmResponse, Role, SwitchyardError, SwitchyardResult, ToolCall, ToolDefinition,
    Usage,
};
use tracing::debug;

/// Default base URL for an OpenAI-compatible provider id.
pub fn default_base_url(provider_id: &str) -> &'static str {
    match provider_id {
        "groq" => "https://api.groq.com/openai",
        "openrouter" => "https://openrouter.ai/api",
        "kimi" => "https://api.moonshot.ai",
        "github-copilot" => "https://api.githubcopilot.com",
        _ => "https://api.openai.com",
    }
}

/// Path of the chat completions endpoint below the base URL.
///
/// GitHub Copilot serves it without the `/v1` prefix.
pub fn completions_path(provider_id: &str) -> &'static str {
    match provider_id {
        "github-copilot" => "/chat/completions",
        _ => "/v1/chat/completions",
    }
}

/// OpenAI-compatible API backend.
///
/// Works with OpenAI, OpenRouter, Groq, Kimi, GitHub Copilot, and any other
/// provider that implements the OpenAI chat completions API.
pub struct OpenAiBackend {
    provider_id: String,
    account_id: String,
    base_url: String,
    max_output_tokens: u32,
    auth: AccountAuth,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Creates a backend for `account`.
    pub fn new(account: &ProviderAccount, auth: AccountAuth) -> Self {
        let base_url = account
            .endpoint_override
            .clone()
            .unwrap_or_else(|| default_base_url(&account.provider_id).to_string());
        Self {
            provider_id: account.provider_id.clone(),
            account_id: account.account_id.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_output_tokens: account.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
            auth,
            http: reqwest::Client::new(),
        }
    }

    fn add_provider_headers(
        &self,
        request: reqwest::RequestBuilder,
        bearer: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let request = match bearer {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        };

        // OpenRouter requires extra headers
        if self.provider_id == "openrouter" {
            request
                .header("HTTP-Referer", "https://github.com/switchyard-rs/switchyard")
                .header("X-Title", "Switchyard")
        } else {
            request
        }
    }
}

/// Translates the conversation into chat-completions messages.
pub fn build_messages(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|m| match m.role {
            Role::Assistant if !m.tool_calls.is_empty() => serde_json::json!({
                "role": "assistant",
                "content": if m.content.is_empty() { None } else { Some(&m.content) },
                "tool_calls": m.tool_calls.iter().map(|tc| serde_json::json!({
                    "id": tc.id,
                    "type": "function",
                    "function": { "name": tc.name, "arguments": tc.arguments },
                })).collect::<Vec<_>>(),
            }),
            Role::Tool => serde_json::json!({
                "role": "tool",
                "tool_call_id": m.tool_call_id.as_deref().unwrap_or_default(),
                "content": m.content,
            }),
            role => serde_json::json!({
                "role": role,
                "content": m.content,
            }),
        })
        .collect()
}

/// Translates tool definitions into `function` tools.
pub fn build_tools(tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
    tools
        .iter()
        .map(|t| {
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }
            })
        })
        .collect()
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        model: &str,
    ) -> SwitchyardResult<LlmResponse> {
        let url = format!("{}{}", self.base_url, completions_path(&self.provider_id));
        let bearer = self.auth.resolve().await?;

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": self.max_output_tokens,
            "messages": build_messages(messages),
        });

        if !tools.is_empty() {
            body["tools"] = serde_json::json!(build_tools(tools));
        }

        debug!(
            provider = %self.provider_id,
            account = %self.account_id,
            model,
            "Calling OpenAI-compatible API"
        );

        let resp = self
            .add_provider_headers(self.http.post(&url), bearer.as_deref())
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            return Err(status_error("OpenAI", resp).await);
        }

        let resp_body: serde_json::Value = resp.json().await.map_err(transport_error)?;
        parse_openai_response(&resp_body)
    }
}

/// Parses a chat-completions response body.
pub fn parse_openai_response(body: &serde_json::Value) -> SwitchyardResult<LlmResponse> {
    let choice = body["choices"]
        .get(0)
        .ok_or_else(|| SwitchyardError::Agent("No choices in OpenAI response".into()))?;
    let message = &choice["message"];
    let content = message["content"].as_str().unwrap_or_default().to_string();

    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|tc| {
                    let id = tc["id"].as_str()?;
                    let name = tc["function"]["name"].as_str()?;
                    let arguments = tc["function"]["arguments"].as_str().unwrap_or("{}");
                    Some(ToolCall::new(id, name, arguments))
                })
                .collect()
        })
        .unwrap_or_default();

    let usage = body["usage"].as_object().map(|u| Usage {
        input_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
        output_tokens: u
            .get("completion_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
    });

    Ok(LlmResponse {
        content,
        tool_calls,
        usage,
        stop_reason: choice["finish_reason"].as_str().map(String::from),
    })
}
