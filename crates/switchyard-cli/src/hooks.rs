use async_trait::async_trait;
use switchyard_agent::{ErrorContext, LifecycleHook, MessageContext};
use switchyard_core::{LlmResponse, ToolResult};
use tracing::{info, warn};

/// Emits one structured event per loop milestone.
pub struct TracingHook;

#[async_trait]
impl LifecycleHook for TracingHook {
    async fn on_message_received(&self, ctx: &MessageContext<'_>) {
        info!(
            message_id = %ctx.message.id,
            user_id = %ctx.paired_user.user_id,
            platform = %ctx.paired_user.platform,
            "Message accepted"
        );
    }

    async fn after_llm(&self, response: &LlmResponse) {
        let (input_tokens, output_tokens) = response
            .usage
            .as_ref()
            .map_or((0, 0), |u| (u.input_tokens, u.output_tokens));
        info!(
            tool_calls = response.tool_calls.len(),
            input_tokens,
            output_tokens,
            stop_reason = response.stop_reason.as_deref().unwrap_or("unknown"),
            "Model responded"
        );
    }

    async fn after_tool_exec(&self, result: &ToolResult) {
        info!(
            tool = %result.name,
            call_id = %result.tool_call_id,
            is_error = result.is_error,
            "Tool finished"
        );
    }

    async fn on_error(&self, ctx: &ErrorContext<'_>) {
        warn!(phase = ?ctx.phase, error = %ctx.error, "Agent loop error");
    }
}
