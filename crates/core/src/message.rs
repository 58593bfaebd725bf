//! Message and identity value types.
//!
//! A run's history is a plain `Vec<Message>`: the caller hands one in, the
//! Conversation Driver appends to it, and the caller gets it back to persist.
//! Serialized with serde it can be fed into a later run unchanged.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (chat).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the student (or staff member) a run acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerId(pub String);

impl CallerId {
    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    /// Placeholder identity for local tooling that has no signed-in user.
    pub fn anonymous() -> Self {
        Self("anonymous".into())
    }
}

impl std::fmt::Display for CallerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message in a conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text sent to the model: the user's own words, tool results, directives
    User,
    /// Raw model output kept verbatim
    Assistant,
    /// A finalized, user-visible response extracted from an answer tag
    Answer,
    /// Model text that ended a turn without ever being tagged as an answer
    Question,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Answer => "answer",
            Role::Question => "question",
        }
    }

    /// Whether this role carries text the end user is meant to read.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, Role::Answer | Role::Question)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who (or what) this message represents
    pub role: Role,

    /// The text content
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a finalized answer message.
    pub fn answer(content: impl Into<String>) -> Self {
        Self::new(Role::Answer, content)
    }

    /// Create an implicit (untagged) answer message.
    pub fn question(content: impl Into<String>) -> Self {
        Self::new(Role::Question, content)
    }
}
