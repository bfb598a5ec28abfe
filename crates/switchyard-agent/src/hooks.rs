use async_trait::async_trait;
use std::sync::Arc;
use switchyard_core::{
    ChatMessage, InboundMessage, LlmResponse, PairedUser, SwitchyardError, ToolCall,
    ToolDefinition, ToolResult, UserIdentity,
};

/// Outcome of a `before_tool_exec` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDecision {
    /// Let the tool run.
    Allow,
    /// Skip the tool and answer the call with a policy error.
    Deny,
}

/// Passed to `on_message_received` once the sender passed the pairing check.
pub struct MessageContext<'a> {
    /// The inbound message.
    pub message: &'a InboundMessage,
    /// The sender's approved pairing record.
    pub paired_user: &'a PairedUser,
}

/// What is about to be sent to the router. `before_llm` hooks may rewrite it.
#[derive(Debug, Clone)]
pub struct LlmContext {
    /// Conversation for this iteration.
    pub messages: Vec<ChatMessage>,
    /// Tools advertised for this iteration.
    pub tools: Vec<ToolDefinition>,
    /// Requested model reference, or `default`.
    pub model: String,
}

/// Passed to `before_tool_exec`.
pub struct ToolExecContext<'a> {
    /// The call about to run.
    pub tool_call: &'a ToolCall,
    /// Arguments parsed as JSON, when they parse.
    pub parsed_args: Option<serde_json::Value>,
    /// Who sent the message that led to this call.
    pub sender: &'a UserIdentity,
}

/// Loop phase an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPhase {
    /// Router call.
    Llm,
    /// Tool execution.
    Tool,
    /// Delivering a reply.
    Channel,
}

/// Passed to `on_error`.
pub struct ErrorContext<'a> {
    /// The error.
    pub error: &'a SwitchyardError,
    /// Where it happened.
    pub phase: ErrorPhase,
    /// The inbound message being processed.
    pub message: &'a InboundMessage,
}

/// Observer of the agent loop. Every method defaults to a no-op.
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    /// A paired sender's message was accepted.
    async fn on_message_received(&self, _ctx: &MessageContext<'_>) {}

    /// Rewrites the request before the router sees it.
    async fn before_llm(&self, ctx: LlmContext) -> LlmContext {
        ctx
    }

    /// The router answered.
    async fn after_llm(&self, _response: &LlmResponse) {}

    /// Decides whether a tool call may run.
    async fn before_tool_exec(&self, _ctx: &ToolExecContext<'_>) -> HookDecision {
        HookDecision::Allow
    }

    /// A tool call finished (successfully or not).
    async fn after_tool_exec(&self, _result: &ToolResult) {}

    /// The loop hit an error.
    async fn on_error(&self, _ctx: &ErrorContext<'_>) {}
}

/// Hooks in registration order.
///
/// `before_llm` is folded left to right, each hook seeing the previous one's
/// output. `before_tool_exec` stops at the first `Deny`. Everything else is
/// dispatched to every hook in turn.
#[derive(Clone)]
pub struct HookChain {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl HookChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Add a hook to the chain.
    pub fn add(&mut self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.push(hook);
    }

    /// Appends every hook of `other`, after the ones already registered.
    pub fn merge(&mut self, other: HookChain) {
        self.hooks.extend(other.hooks);
    }

    /// Get the number of hooks in the chain.
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Dispatches `on_message_received`.
    pub async fn on_message_received(&self, ctx: &MessageContext<'_>) {
        for hook in &self.hooks {
            hook.on_message_received(ctx).await;
        }
    }

    /// Folds `before_llm` over every hook.
    pub async fn before_llm(&self, ctx: LlmContext) -> LlmContext {
        let mut ctx = ctx;
        for hook in &self.hooks {
            ctx = hook.before_llm(ctx).await;
        }
        ctx
    }

    /// Dispatches `after_llm`.
    pub async fn after_llm(&self, response: &LlmResponse) {
        for hook in &self.hooks {
            hook.after_llm(response).await;
        }
    }

    /// Returns `Deny` as soon as one hook denies.
    pub async fn before_tool_exec(&self, ctx: &ToolExecContext<'_>) -> HookDecision {
        for hook in &self.hooks {
            if hook.before_tool_exec(ctx).await == HookDecision::Deny {
                return HookDecision::Deny;
            }
        }
        HookDecision::Allow
    }

    /// Dispatches `after_tool_exec`.
    pub async fn after_tool_exec(&self, result: &ToolResult) {
        for hook in &self.hooks {
            hook.after_tool_exec(result).await;
        }
    }

    /// Dispatches `on_error`.
    pub async fn on_error(&self, ctx: &ErrorContext<'_>) {
        for hook in &self.hooks {
            hook.on_error(ctx).await;
        }
    }
}

impl Default for HookChain {
    fn default() -> Self {
        Self::new()
    }
}
