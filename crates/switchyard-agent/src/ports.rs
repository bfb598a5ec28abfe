use async_trait::async_trait;
use switchyard_core::{
    ChatMessage, ChatOverrides, LlmResponse, OutboundMessage, PairedUser, SwitchyardResult,
    ToolCall, ToolDefinition, ToolResult,
};
use switchyard_providers::ModelRouter;

/// Something that answers a conversation for a named agent.
#[async_trait]
pub trait LlmChat: Send + Sync {
    /// One completion over the agent's candidate chain.
    async fn chat(
        &self,
        agent_id: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        overrides: Option<&ChatOverrides>,
    ) -> SwitchyardResult<LlmResponse>;
}

#[async_trait]
impl LlmChat for ModelRouter {
    async fn chat(
        &self,
        agent_id: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        overrides: Option<&ChatOverrides>,
    ) -> SwitchyardResult<LlmResponse> {
        ModelRouter::chat(self, agent_id, messages, tools, overrides).await
    }
}

/// Runs tool calls on behalf of the loop.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Definitions advertised to the backend.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Executes one call. Tool-level failures come back as an error
    /// [`ToolResult`]; `Err` is reserved for the executor itself failing.
    async fn execute(&self, call: &ToolCall, sender_id: &str) -> SwitchyardResult<ToolResult>;
}

/// Pairing lookups needed by the loop.
#[async_trait]
pub trait PairingService: Send + Sync {
    /// The sender's pairing record, if any.
    async fn paired_user(&self, user_id: &str, platform: &str) -> Option<PairedUser>;

    /// Stamps the sender's last activity.
    async fn update_last_seen(&self, user_id: &str, platform: &str);
}

/// Delivers replies back to a channel.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends one outbound message.
    async fn send(&self, message: OutboundMessage) -> SwitchyardResult<()>;
}
