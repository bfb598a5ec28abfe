use super::{status_error, transport_error, LlmBackend, DEFAULT_MAX_OUTPUT_TOKENS};
use crate::account::{AuthMode, ProviderAccount};
use crate::auth::AccountAuth;
use async_trait::async_trait;
use switchyard_core::{
    ChatMessage, LlmResponse, Role, SwitchyardError, SwitchyardResult, ToolCall, ToolDefinition,
    Usage,
};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini `generateContent` backend.
///
/// OAuth accounts send a Bearer token; API-key accounts send the key in the
/// `x-goog-api-key` header so it never appears in a URL.
pub struct GeminiBackend {
    account_id: String,
    base_url: String,
    max_output_tokens: u32,
    auth: AccountAuth,
    http: reqwest::Client,
}

impl GeminiBackend {
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

/// Name of the function a tool answer belongs to.
///
/// Gemini matches `functionResponse` parts by function name, so the name is
/// recovered from the nearest earlier assistant turn that issued `call_id`.
fn function_name_for(history: &[ChatMessage], call_id: &str) -> String {
    history
        .iter()
        .rev()
        .flat_map(|m| m.tool_calls.iter())
        .find(|tc| tc.id == call_id)
        .map_or_else(|| call_id.to_string(), |tc| tc.name.clone())
}

/// Splits out the system instruction and translates the rest into `contents`.
///
/// Assistant turns become `model` turns with `functionCall` parts. Consecutive
/// tool answers are merged into one `user` turn of `functionResponse` parts.
pub fn build_contents(messages: &[ChatMessage]) -> (Option<String>, Vec<serde_json::Value>) {
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
    for (i, m) in messages.iter().enumerate() {
        match m.role {
            Role::System => {}
            Role::Tool => {
                let call_id = m.tool_call_id.as_deref().unwrap_or_default();
                let part = serde_json::json!({
                    "functionResponse": {
                        "name": function_name_for(&messages[..i], call_id),
                        "response": { "result": m.content },
                    }
                });
                let previous_is_responses = out.last().is_some_and(|prev| {
                    prev["role"] == "user" && prev["parts"][0].get("functionResponse").is_some()
                });
                match out.last_mut() {
                    Some(prev) if previous_is_responses => {
                        if let Some(parts) = prev["parts"].as_array_mut() {
                            parts.push(part);
                        }
                    }
                    _ => out.push(serde_json::json!({ "role": "user", "parts": [part] })),
                }
            }
            Role::Assistant => {
                let mut parts = Vec::new();
                if !m.content.is_empty() {
                    parts.push(serde_json::json!({ "text": m.content }));
                }
                for tc in &m.tool_calls {
                    let args = tc
                        .parsed_arguments()
                        .unwrap_or_else(|_| serde_json::json!({}));
                    parts.push(serde_json::json!({
                        "functionCall": { "name": tc.name, "args": args }
                    }));
                }
                out.push(serde_json::json!({ "role": "model", "parts": parts }));
            }
            Role::User => out.push(serde_json::json!({
                "role": "user",
                "parts": [{ "text": m.content }],
            })),
        }
    }
    (system, out)
}

/// Translates tool definitions into a single `functionDeclarations` tool.
pub fn build_tools(tools: &[ToolDefinition]) -> serde_json::Value {
    let declarations: Vec<serde_json::Value> = tools
        .iter()
        .map(|t| {
            serde_json::json!({
                "name": t.name,
                "description": t.description,
                "parameters": t.parameters,
            })
        })
        .collect();
    serde_json::json!([{ "functionDeclarations": declarations }])
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        model: &str,
    ) -> SwitchyardResult<LlmResponse> {
        let url = format!("{}/models/{model}:generateContent", self.base_url);
        let credential = self.auth.resolve().await?;
        let (system, contents) = build_contents(messages);

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": { "maxOutputTokens": self.max_output_tokens },
        });

        if let Some(sys) = system {
            body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": sys }] });
        }

        if !tools.is_empty() {
            body["tools"] = build_tools(tools);
        }

        debug!(
            account = %self.account_id,
            model,
            auth = %self.auth.mode(),
            "Calling Gemini API"
        );

        let request = self.http.post(&url);
        let request = match (self.auth.mode(), credential) {
            (AuthMode::OAuth, Some(token)) => {
                request.header("Authorization", format!("Bearer {token}"))
            }
            (_, Some(key)) => request.header("x-goog-api-key", key),
            (_, None) => request,
        };

        let resp = request
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            return Err(status_error("Gemini", resp).await);
        }

        let resp_body: serde_json::Value = resp.json().await.map_err(transport_error)?;
        parse_gemini_response(&resp_body)
    }
}

/// Parses a `generateContent` response body.
///
/// Function calls without an `id` get a generated one so tool answers can be
/// matched back to them.
pub fn parse_gemini_response(body: &serde_json::Value) -> SwitchyardResult<LlmResponse> {
    let candidate = &body["candidates"][0];
    let parts = candidate["content"]["parts"]
        .as_array()
        .ok_or_else(|| SwitchyardError::Agent("No content in Gemini response".into()))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for part in parts {
        if let Some(t) = part["text"].as_str() {
            text.push_str(t);
        }
        if let Some(call) = part.get("functionCall") {
            let id = call["id"]
                .as_str()
                .map_or_else(|| format!("gemini-{}", uuid::Uuid::new_v4()), String::from);
            let name = call["name"].as_str().unwrap_or_default();
            let args = match &call["args"] {
                serde_json::Value::Null => "{}".to_string(),
                args => args.to_string(),
            };
            tool_calls.push(ToolCall::new(id, name, args));
        }
    }

    let usage = body["usageMetadata"].as_object().map(|u| Usage {
        input_tokens: u
            .get("promptTokenCount")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        output_tokens: u
            .get("candidatesTokenCount")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
    });

    Ok(LlmResponse {
        content: text,
        tool_calls,
        usage,
        stop_reason: candidate["finishReason"].as_str().map(String::from),
    })
}
