//! Message types for the Colloquy conversation model.
//!
//! A [`Message`] is a role plus an ordered list of content [`Part`]s. Parts
//! are distinguished on the wire by field presence (`{"text": ...}`,
//! `{"function_call": ...}`), so the plain-text shape from clients stays
//! stable as new part kinds are added.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Role
// ─────────────────────────────────────────────────────────────────────────────

/// Originator of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human (or client-side) message.
    User,
    /// A message produced by the agent, including tool traffic.
    Agent,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Agent => f.write_str("agent"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parts
// ─────────────────────────────────────────────────────────────────────────────

/// A tool invocation requested by the agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Tool name.
    pub name: String,
    /// Tool arguments (JSON object).
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// The result of a tool invocation, fed back into the turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    /// Name of the tool that produced this result.
    pub name: String,
    /// Tool output (arbitrary JSON).
    pub response: Value,
}

/// One content part of a message.
///
/// Untagged: the wire shape is `{"text": ...}` etc., matched by field
/// presence. New variants extend the enum without disturbing existing parts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum Part {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// A tool invocation.
    FunctionCall {
        /// The call being made.
        function_call: FunctionCall,
    },
    /// A tool result.
    FunctionResponse {
        /// The result being returned.
        function_response: FunctionResponse,
    },
}

impl Part {
    /// Build a text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The text content, if this is a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────────────────

/// A role plus an ordered sequence of content parts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,
    /// Ordered content parts.
    pub parts: Vec<Part>,
}

impl Message {
    /// Build a single-text-part user message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    /// Build a single-text-part agent message.
    #[must_use]
    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenated text of all text parts.
    #[must_use]
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// Whether the message carries no parts at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}
