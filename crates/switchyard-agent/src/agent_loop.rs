use crate::config::AgentLoopConfig;
use crate::hooks::{
    ErrorContext, ErrorPhase, HookChain, HookDecision, LlmContext, MessageContext,
    ToolExecContext,
};
use crate::ports::{LlmChat, MessageSender, PairingService, ToolExecutor};
use serde::Serialize;
use std::sync::Arc;
use switchyard_core::{ChatMessage, InboundMessage, OutboundMessage, ToolResult};
use switchyard_providers::DEFAULT_AGENT_ID;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Sent to senders without an approved pairing record.
pub const UNPAIRED_MESSAGE: &str = "⚠️ Access denied. This user is not paired.";
/// Sent when the run deadline passes.
pub const TIMEOUT_MESSAGE: &str = "I ran out of time processing your request. Please try again.";
/// Sent when the router exhausts every candidate.
pub const LLM_UNAVAILABLE_MESSAGE: &str =
    "All LLM providers are currently unavailable. Please try again later.";
/// Sent when the iteration budget runs out.
pub const MAX_ITERATIONS_MESSAGE: &str =
    "I reached my maximum thinking steps. Please try rephrasing your request.";
/// Replaces an empty final answer.
pub const EMPTY_RESPONSE_PLACEHOLDER: &str = "I have nothing to say.";
/// Tool result for calls beyond `max_tool_calls`.
pub const MAX_TOOL_CALLS_MESSAGE: &str = "Error: Maximum tool calls reached for this turn.";
/// Tool result for calls a hook denied.
pub const TOOL_DENIED_MESSAGE: &str = "Error: Tool execution denied by policy.";

/// Why a run ended without a final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// Sender is not paired.
    Unpaired,
    /// The deadline passed.
    Timeout,
    /// `max_iterations` router round-trips without a final answer.
    MaxIterations,
    /// The router failed.
    LlmError,
}

impl AbortReason {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaired => "unpaired",
            Self::Timeout => "timeout",
            Self::MaxIterations => "max_iterations",
            Self::LlmError => "llm_error",
        }
    }
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentLoopResult {
    /// Router round-trips started.
    pub iterations: u32,
    /// Tool calls counted against `max_tool_calls`.
    pub tool_calls_total: u32,
    /// The answer sent to the user, when the run finished normally.
    pub final_response: Option<String>,
    /// Set when the run was cut short.
    pub abort_reason: Option<AbortReason>,
}

impl AgentLoopResult {
    fn aborted(iterations: u32, tool_calls_total: u32, reason: AbortReason) -> Self {
        Self {
            iterations,
            tool_calls_total,
            final_response: None,
            abort_reason: Some(reason),
        }
    }
}

/// Everything a run needs.
pub struct AgentLoopDeps {
    /// Model router (or any other chat implementation).
    pub llm: Arc<dyn LlmChat>,
    /// Tool definitions and execution.
    pub tools: Arc<dyn ToolExecutor>,
    /// Pairing lookups.
    pub pairing: Arc<dyn PairingService>,
    /// Reply delivery.
    pub sender: Arc<dyn MessageSender>,
    /// Lifecycle hooks.
    pub hooks: HookChain,
    /// Bounds.
    pub config: AgentLoopConfig,
    /// First message of every conversation.
    pub system_prompt: String,
    /// Agent whose model chain is used. Defaults to `default`.
    pub agent_id: Option<String>,
}

/// Processes one inbound message to completion.
///
/// The sender must hold an approved pairing record. The run then alternates
/// router calls and tool execution until the backend answers without tool
/// calls, or one of the bounds (`max_iterations`, the deadline) is hit, or the
/// router fails. Every outcome sends exactly one reply through
/// `deps.sender`.
///
/// The deadline is checked before each iteration and also wraps the router
/// call, so a slow backend, a credential refresh or a retry delay in flight
/// is dropped when time runs out. Tool calls are not interrupted.
pub async fn run_agent_loop(message: &InboundMessage, deps: &AgentLoopDeps) -> AgentLoopResult {
    let started = Instant::now();
    let deadline = started + deps.config.timeout();
    let agent_id = deps.agent_id.as_deref().unwrap_or(DEFAULT_AGENT_ID);
    let sender = &message.sender;

    let paired = deps
        .pairing
        .paired_user(&sender.user_id, &sender.platform)
        .await
        .filter(|user| user.is_approved());
    let Some(paired_user) = paired else {
        warn!(
            user_id = %sender.user_id,
            platform = %sender.platform,
            "Rejected message from unpaired sender"
        );
        reply(deps, message, UNPAIRED_MESSAGE).await;
        return AgentLoopResult::aborted(0, 0, AbortReason::Unpaired);
    };

    deps.pairing
        .update_last_seen(&sender.user_id, &sender.platform)
        .await;
    deps.hooks
        .on_message_received(&MessageContext {
            message,
            paired_user: &paired_user,
        })
        .await;

    let mut conversation = vec![
        ChatMessage::system(deps.system_prompt.clone()),
        ChatMessage::user(message.text.clone()),
    ];
    let tool_defs = deps.tools.definitions();
    let requested_model = message
        .overrides
        .as_ref()
        .and_then(|o| o.model.clone())
        .unwrap_or_else(|| DEFAULT_AGENT_ID.to_string());

    let mut iterations: u32 = 0;
    let mut tool_calls_total: u32 = 0;

    info!(
        message_id = %message.id,
        agent = %agent_id,
        user_id = %sender.user_id,
        "Starting agent loop"
    );

    while iterations < deps.config.max_iterations {
        if Instant::now() >= deadline {
            return timed_out(deps, message, iterations, tool_calls_total).await;
        }
        iterations += 1;
        debug!(message_id = %message.id, iteration = iterations, "Agent loop iteration");

        let ctx = deps
            .hooks
            .before_llm(LlmContext {
                messages: conversation.clone(),
                tools: tool_defs.clone(),
                model: requested_model.clone(),
            })
            .await;

        let call = deps
            .llm
            .chat(agent_id, &ctx.messages, &ctx.tools, message.overrides.as_ref());
        let response = match tokio::time::timeout_at(deadline, call).await {
            Err(_) => return timed_out(deps, message, iterations, tool_calls_total).await,
            Ok(Err(e)) => {
                error!(message_id = %message.id, error = %e, "Router call failed");
                deps.hooks
                    .on_error(&ErrorContext {
                        error: &e,
                        phase: ErrorPhase::Llm,
                        message,
                    })
                    .await;
                reply(deps, message, LLM_UNAVAILABLE_MESSAGE).await;
                return AgentLoopResult::aborted(
                    iterations,
                    tool_calls_total,
                    AbortReason::LlmError,
                );
            }
            Ok(Ok(response)) => response,
        };

        deps.hooks.after_llm(&response).await;

        if !response.has_tool_calls() {
            let text = if response.content.is_empty() {
                EMPTY_RESPONSE_PLACEHOLDER.to_string()
            } else {
                response.content
            };
            reply(deps, message, &text).await;
            info!(
                message_id = %message.id,
                iterations,
                tool_calls = tool_calls_total,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Agent loop completed"
            );
            return AgentLoopResult {
                iterations,
                tool_calls_total,
                final_response: Some(text),
                abort_reason: None,
            };
        }

        conversation.push(ChatMessage::assistant_with_tools(
            response.content.clone(),
            response.tool_calls.clone(),
        ));

        for call in &response.tool_calls {
            if tool_calls_total >= deps.config.max_tool_calls {
                warn!(
                    tool = %call.name,
                    call_id = %call.id,
                    max_tool_calls = deps.config.max_tool_calls,
                    "Tool call cap reached"
                );
                conversation.push(ChatMessage::tool(call.id.clone(), MAX_TOOL_CALLS_MESSAGE));
                continue;
            }

            let exec_ctx = ToolExecContext {
                tool_call: call,
                parsed_args: call.parsed_arguments().ok(),
                sender,
            };
            if deps.hooks.before_tool_exec(&exec_ctx).await == HookDecision::Deny {
                info!(tool = %call.name, call_id = %call.id, "Tool call denied by hook");
                tool_calls_total += 1;
                conversation.push(ChatMessage::tool(call.id.clone(), TOOL_DENIED_MESSAGE));
                continue;
            }

            info!(tool = %call.name, call_id = %call.id, "Executing tool call");
            let result = match deps.tools.execute(call, &sender.user_id).await {
                Ok(result) => result,
                Err(e) => {
                    error!(tool = %call.name, error = %e, "Tool execution failed");
                    deps.hooks
                        .on_error(&ErrorContext {
                            error: &e,
                            phase: ErrorPhase::Tool,
                            message,
                        })
                        .await;
                    ToolResult::error(call, format!("Error: {e}"))
                }
            };
            tool_calls_total += 1;

            deps.hooks.after_tool_exec(&result).await;
            conversation.push(ChatMessage::tool(result.tool_call_id, result.content));
        }
    }

    warn!(
        message_id = %message.id,
        max_iterations = deps.config.max_iterations,
        "Agent loop reached max iterations"
    );
    reply(deps, message, MAX_ITERATIONS_MESSAGE).await;
    AgentLoopResult::aborted(iterations, tool_calls_total, AbortReason::MaxIterations)
}

async fn timed_out(
    deps: &AgentLoopDeps,
    message: &InboundMessage,
    iterations: u32,
    tool_calls_total: u32,
) -> AgentLoopResult {
    warn!(
        message_id = %message.id,
        timeout_ms = deps.config.timeout_ms,
        iterations,
        "Agent loop timed out"
    );
    reply(deps, message, TIMEOUT_MESSAGE).await;
    AgentLoopResult::aborted(iterations, tool_calls_total, AbortReason::Timeout)
}

/// Delivery failures are logged and reported to `on_error`; the run result
/// does not change.
async fn reply(deps: &AgentLoopDeps, message: &InboundMessage, text: &str) {
    if let Err(e) = deps
        .sender
        .send(OutboundMessage::reply_to(message, text))
        .await
    {
        error!(channel = %message.channel_id, error = %e, "Failed to send reply");
        deps.hooks
            .on_error(&ErrorContext {
                error: &e,
                phase: ErrorPhase::Channel,
                message,
            })
            .await;
    }
}
