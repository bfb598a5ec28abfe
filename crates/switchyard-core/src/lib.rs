//! Core types and error definitions for Switchyard.
//!
//! This crate provides the foundational types shared across all Switchyard
//! crates: the unified error enum, the provider-neutral chat and tool-call
//! shapes, and the channel-facing inbound/outbound message records.
//!
//! # Main types
//!
//! - [`SwitchyardError`] — Unified error enum for all Switchyard subsystems.
//! - [`SwitchyardResult`] — Convenience alias for `Result<T, SwitchyardError>`.
//! - [`Role`] — Message role (system, user, assistant, tool).
//! - [`ChatMessage`] — One entry of a provider-neutral conversation.
//! - [`LlmResponse`] — The provider-neutral backend response.
//! - [`ToolCall`] / [`ToolResult`] — Tool invocation request and outcome.
//! - [`InboundMessage`] / [`OutboundMessage`] — Channel-facing message records.

/// Inbound/outbound message and pairing records.
pub mod channel;
/// Error types.
pub mod error;
/// Conversation message and backend response types.
pub mod message;
/// Tool call, result and definition types.
pub mod tool;

pub use channel::{
    ChatOverrides, InboundMessage, OutboundMessage, PairedUser, PairingStatus, ReasoningEffort,
    UserIdentity,
};
pub use error::{SwitchyardError, SwitchyardResult};
pub use message::{ChatMessage, LlmResponse, Role, Usage};
pub use tool::{ToolCall, ToolDefinition, ToolResult};
