use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform-scoped identity of a message sender.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserIdentity {
    /// Platform-specific user id (e.g. a Telegram user id).
    pub user_id: String,
    /// Platform name (e.g. `telegram`, `webchat`, `cli`).
    pub platform: String,
    /// Display name, when the platform provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl UserIdentity {
    /// Creates an identity without a display name.
    pub fn new(user_id: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            platform: platform.into(),
            username: None,
        }
    }
}

/// Requested reasoning depth for a single message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    /// Fast, shallow reasoning.
    Low,
    /// Slow, deep reasoning.
    High,
}

/// Per-message routing overrides chosen by the user (e.g. in a UI).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatOverrides {
    /// Model reference (`provider/account/model`) to try before the agent's chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Requested reasoning depth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningEffort>,
    /// Whether extended thinking was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<bool>,
}

/// A user message received from a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Unique message id.
    pub id: String,
    /// Id of the adapter the message arrived on.
    pub channel_id: String,
    /// Who sent the message.
    pub sender: UserIdentity,
    /// The message text.
    pub text: String,
    /// When the message was received.
    pub timestamp: DateTime<Utc>,
    /// Optional per-message routing overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<ChatOverrides>,
}

/// A message to deliver through a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Adapter to deliver through.
    pub channel_id: String,
    /// Platform user id of the recipient.
    pub recipient_id: String,
    /// Text to deliver.
    pub text: String,
    /// Id of the inbound message this answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<String>,
}

impl OutboundMessage {
    /// Builds a reply to `inbound` on the same channel.
    pub fn reply_to(inbound: &InboundMessage, text: impl Into<String>) -> Self {
        Self {
            channel_id: inbound.channel_id.clone(),
            recipient_id: inbound.sender.user_id.clone(),
            text: text.into(),
            reply_to_message_id: Some(inbound.id.clone()),
        }
    }
}

/// Approval state of a pairing record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PairingStatus {
    /// Pairing requested, waiting for approval.
    Pending,
    /// Sender may use the assistant.
    Approved,
    /// Access was withdrawn.
    Revoked,
}

/// A sender's pairing record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PairedUser {
    /// Platform-specific user id.
    pub user_id: String,
    /// Platform name.
    pub platform: String,
    /// Display name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Current approval state.
    pub status: PairingStatus,
    /// One-time code for a pending request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was approved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    /// When access was revoked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    /// Last time the sender was seen by the agent loop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl PairedUser {
    /// Whether this record grants access.
    pub fn is_approved(&self) -> bool {
        self.status == PairingStatus::Approved
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_targets_sender() {
        let inbound = InboundMessage {
            id: "m-1".into(),
            channel_id: "telegram".into(),
            sender: UserIdentity::new("42", "telegram"),
            text: "hi".into(),
            timestamp: Utc::now(),
            overrides: None,
        };
        let reply = OutboundMessage::reply_to(&inbound, "hello");
        assert_eq!(reply.channel_id, "telegram");
        assert_eq!(reply.recipient_id, "42");
        assert_eq!(reply.reply_to_message_id.as_deref(), Some("m-1"));
    }

    #[test]
    fn test_overrides_deserialize_lowercase() {
        let o: ChatOverrides =
            serde_json::from_str(r#"{"model": "a/b/c", "reasoning": "high"}"#).unwrap();
        assert_eq!(o.model.as_deref(), Some("a/b/c"));
        assert_eq!(o.reasoning, Some(ReasoningEffort::High));
        assert_eq!(o.thinking, None);
    }
}
