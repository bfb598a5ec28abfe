//! Bounded agent execution loop for Switchyard.
//!
//! [`run_agent_loop`] takes one inbound message from a paired sender and
//! drives the router and tools until the backend produces a final answer or a
//! bound is hit. Collaborators are injected through the traits in [`ports`].
//!
//! # Main types
//!
//! - [`AgentLoopDeps`] — Router, tools, pairing, sender, hooks and bounds.
//! - [`AgentLoopResult`] / [`AbortReason`] — Terminal summary of a run.
//! - [`LifecycleHook`] / [`HookChain`] — Observers and policy around the loop.
//! - [`ToolRegistry`] — Named tools implementing [`ToolExecutor`].
//! - [`InMemoryPairingService`] — OTP-based sender pairing.

/// The agent loop.
pub mod agent_loop;
/// Loop bounds.
pub mod config;
/// Lifecycle hooks.
pub mod hooks;
/// In-memory pairing records.
pub mod pairing;
/// Collaborator traits.
pub mod ports;
/// Tool trait and registry.
pub mod tools;

pub use agent_loop::{
    run_agent_loop, AbortReason, AgentLoopDeps, AgentLoopResult, EMPTY_RESPONSE_PLACEHOLDER,
    LLM_UNAVAILABLE_MESSAGE, MAX_ITERATIONS_MESSAGE, MAX_TOOL_CALLS_MESSAGE, TIMEOUT_MESSAGE,
    TOOL_DENIED_MESSAGE, UNPAIRED_MESSAGE,
};
pub use config::AgentLoopConfig;
pub use hooks::{
    ErrorContext, ErrorPhase, HookChain, HookDecision, LifecycleHook, LlmContext, MessageContext,
    ToolExecContext,
};
pub use pairing::{InMemoryPairingService, PairingRequest};
pub use ports::{LlmChat, MessageSender, PairingService, ToolExecutor};
pub use tools::{CurrentTimeTool, Tool, ToolContext, ToolRegistry};
