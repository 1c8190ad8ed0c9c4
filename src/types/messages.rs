//! Conversation history types
//!
//! History is consumed read-only: the prioritizer draws relevance terms
//! from recent turns and continuity hints from `context_docs`, and the
//! token counter prices each turn for budget planning.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        f.write_str(name)
    }
}

/// A single turn of conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,

    /// Ids of documents that were shown alongside this turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_docs: Vec<String>,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            context_docs: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Attach the ids of documents shown with this turn
    pub fn with_context_docs<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context_docs = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Whether this turn previously showed the given document
    pub fn references(&self, doc_id: &str) -> bool {
        self.context_docs.iter().any(|id| id == doc_id)
    }
}
