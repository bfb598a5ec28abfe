use super::{status_error, transport_error, LlmBackend, DEFAULT_MAX_OUTPUT_TOKENS};
use crate::account::{AuthMode, ProviderAccount};
use crate::auth::AccountAuth;
use async_trait::async_trait;
use serde::Serialize;
use switchyard_core::{
    ChatMessage, LlmResponse, Role, SwitchyardError, SwitchyardResult, ToolCall, ToolDefinition,
    Usage,
};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OAUTH_BETA: &str = "oauth-2025-04-20";

/// Anthropic Messages API backend.
pub struct AnthropicBackend {
    account_id: String,
    base_url: String,
    max_output_tokens: u32,
    auth: AccountAuth,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct AnthropicTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a serde_json::Value,
}

impl AnthropicBackend {
    /// Creates a backend for `account`.
    pub fn new(account: &ProviderAccount, auth: AccountAuth) -> Self {
        let base_url = account
            .endpoint_override
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            account_id: account.account_id.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_output_tokens: account.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
            auth,
            http: reqwest::Client::new(),
        }
    }
}

/// Splits out the system prompt and translates the rest into Messages API turns.
///
/// Consecutive tool answers are merged into one `user` turn of `tool_result`
/// blocks, which the API requires after an assistant turn with several
/// `tool_use` blocks.
pub fn build_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<serde_json::Value>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };

    let mut out: Vec<serde_json::Value> = Vec::new();
    for m in messages.iter().filter(|m| m.role != Role::System) {
        match m.role {
            Role::Tool => {
                let block = serde_json::json!({
                    "type": "tool_result",
                    "tool_use_id": m.tool_call_id.as_deref().unwrap_or_default(),
                    "content": m.content,
                });
                let previous_is_results = out.last().is_some_and(|prev| {
                    prev["role"] == "user"
                        && prev["content"][0]["type"].as_str() == Some("tool_result")
                });
                match out.last_mut() {
                    Some(prev) if previous_is_results => {
                        if let Some(blocks) = prev["content"].as_array_mut() {
                            blocks.push(block);
                        }
                    }
                    _ => out.push(serde_json::json!({ "role": "user", "content": [block] })),
                }
            }
            Role::Assistant if !m.tool_calls.is_empty() => {
                let mut content = Vec::new();
                if !m.content.is_empty() {
                    content.push(serde_json::json!({ "type": "text", "text": m.content }));
                }
                for tc in &m.tool_calls {
                    let input = tc
                        .parsed_arguments()
                        .unwrap_or_else(|_| serde_json::json!({}));
                    content.push(serde_json::json!({
                        "type": "tool_use",
                        "id": tc.id,
                        "name": tc.name,
                        "input": input,
                    }));
                }
                out.push(serde_json::json!({ "role": "assistant", "content": content }));
            }
            role => out.push(serde_json::json!({ "role": role, "content": m.content })),
        }
    }
    (system, out)
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        model: &str,
    ) -> SwitchyardResult<LlmResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let credential = self.auth.resolve().await?;
        let (system, api_messages) = build_messages(messages);

        let anthropic_tools: Vec<AnthropicTool<'_>> = tools
            .iter()
            .map(|t| AnthropicTool {
                name: &t.name,
                description: &t.description,
                input_schema: &t.parameters,
            })
            .collect();

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": self.max_output_tokens,
            "messages": api_messages,
        });

        if let Some(sys) = system {
            body["system"] = serde_json::json!(sys);
        }

        if !anthropic_tools.is_empty() {
            body["tools"] = serde_json::to_value(&anthropic_tools)?;
        }

        debug!(account = %self.account_id, model, "Calling Anthropic API");

        let mut request = self
            .http
            .post(&url)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json");
        request = match (self.auth.mode(), credential) {
            (AuthMode::OAuth, Some(token)) => request
                .header("Authorization", format!("Bearer {token}"))
                .header("anthropic-beta", OAUTH_BETA),
            (_, Some(key)) => request.header("x-api-key", key),
            (_, None) => request,
        };

        let resp = request
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            return Err(status_error("Anthropic", resp).await);
        }

        let resp_body: serde_json::Value = resp.json().await.map_err(transport_error)?;
        parse_anthropic_response(&resp_body)
    }
}

/// Parses a Messages API response body.
pub fn parse_anthropic_response(body: &serde_json::Value) -> SwitchyardResult<LlmResponse> {
    let content = body["content"]
        .as_array()
        .ok_or_else(|| SwitchyardError::Agent("Missing content in Anthropic response".into()))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in content {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    text.push_str(t);
                }
            }
            Some("tool_use") => {
                let id = block["id"].as_str().unwrap_or_default();
                let name = block["name"].as_str().unwrap_or_default();
                tool_calls.push(ToolCall::new(id, name, block["input"].to_string()));
            }
            _ => {}
        }
    }

    let usage = body["usage"].as_object().map(|u| Usage {
        input_tokens: u.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
        output_tokens: u.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
    });

    Ok(LlmResponse {
        content: text,
        tool_calls,
        usage,
        stop_reason: body["stop_reason"].as_str().map(String::from),
    })
}
