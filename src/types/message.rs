//! Message types for the interaction ledger.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::attachment::AttachmentRef;
use super::ids::{MessageId, TurnId};

/// One party in a communication event: the external user, or a named oxy
/// (agent or tool) from the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Party {
    User,
    Oxy(String),
}

impl Party {
    pub fn oxy(name: impl Into<String>) -> Self {
        Self::Oxy(name.into())
    }

    /// Registered name, if this party is an oxy.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::User => None,
            Self::Oxy(name) => Some(name),
        }
    }
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Oxy(name) => f.write_str(name),
        }
    }
}

/// Communication kind of a ledger message.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageKind {
    Text,
    ToolCall,
    ToolResult,
    AttachmentRef,
    Control,
}

/// Message payload. Raw multimodal bytes never appear here, only
/// [`AttachmentRef`]s produced by the attachment store adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Empty,
    Text { text: String },
    Json { value: serde_json::Value },
    Attachments { refs: Vec<AttachmentRef> },
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn json(value: serde_json::Value) -> Self {
        Self::Json { value }
    }

    pub fn attachments(refs: Vec<AttachmentRef>) -> Self {
        Self::Attachments { refs }
    }

    /// Text content, if this payload is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Attachment references carried by this payload.
    pub fn attachment_refs(&self) -> &[AttachmentRef] {
        match self {
            Self::Attachments { refs } => refs,
            _ => &[],
        }
    }
}

/// Immutable record of one communication event between two parties.
///
/// Constructed by [`Ledger::append`](crate::ledger::Ledger::append) from a
/// [`MessageDraft`]; `id` and `created_at` come from the session's logical
/// sequence counter, so ledger order is deterministic and independent of
/// wall-clock time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub turn_id: TurnId,
    pub sender: Party,
    pub recipient: Party,
    pub kind: MessageKind,
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causal_parent: Option<MessageId>,
    /// Logical sequence counter at append time (not wall clock).
    pub created_at: u64,
}

impl Message {
    /// Text content, if any.
    pub fn text(&self) -> Option<&str> {
        self.payload.as_text()
    }

    /// Whether this message initiated its turn (no causal parent).
    pub fn is_turn_initiating(&self) -> bool {
        self.causal_parent.is_none()
    }
}

/// A message awaiting append. The ledger assigns `id`, `turn_id`, and
/// `created_at` when the draft is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    pub sender: Party,
    pub recipient: Party,
    pub kind: MessageKind,
    pub payload: Payload,
    pub causal_parent: Option<MessageId>,
}

impl MessageDraft {
    /// A turn-initiating user message addressed to a named oxy.
    pub fn user_text(recipient: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: Party::User,
            recipient: Party::oxy(recipient),
            kind: MessageKind::Text,
            payload: Payload::text(text),
            causal_parent: None,
        }
    }

    /// A user message carrying attachment references.
    pub fn user_attachments(recipient: impl Into<String>, refs: Vec<AttachmentRef>) -> Self {
        Self {
            sender: Party::User,
            recipient: Party::oxy(recipient),
            kind: MessageKind::AttachmentRef,
            payload: Payload::attachments(refs),
            causal_parent: None,
        }
    }

    /// A nested hop: one oxy addressing another within an open turn.
    pub fn hop(
        sender: Party,
        recipient: impl Into<String>,
        kind: MessageKind,
        payload: Payload,
        causal_parent: MessageId,
    ) -> Self {
        Self {
            sender,
            recipient: Party::oxy(recipient),
            kind,
            payload,
            causal_parent: Some(causal_parent),
        }
    }

    /// A reply settling a hop, sent back to the dispatching party.
    pub fn reply(
        sender: Party,
        recipient: Party,
        kind: MessageKind,
        payload: Payload,
        causal_parent: MessageId,
    ) -> Self {
        Self {
            sender,
            recipient,
            kind,
            payload,
            causal_parent: Some(causal_parent),
        }
    }
}
