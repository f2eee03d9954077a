//! Conversation Turns
//!
//! Standard (role, content) unit used for prompts and persisted history.

use serde::{Deserialize, Serialize};

/// Role of a turn's author
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in a conversation
///
/// Turns are immutable once created; fields are only reachable through
/// accessors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    /// Create a new turn
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system turn
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Append-only conversation history of a session
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a turn
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Append one completed exchange: the user's message, then the reply
    pub fn record_exchange(&mut self, message: impl Into<String>, reply: impl Into<String>) {
        self.push(Turn::user(message));
        self.push(Turn::assistant(reply));
    }

    /// Get all turns
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl From<Vec<Turn>> for History {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}

impl From<History> for Vec<Turn> {
    fn from(history: History) -> Self {
        history.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_creation() {
        let turn = Turn::user("Hello");
        assert_eq!(turn.role(), Role::User);
        assert_eq!(turn.content(), "Hello");
    }

    #[test]
    fn test_record_exchange_appends_in_order() {
        let mut history = History::from(vec![Turn::user("Hi"), Turn::assistant("Hello!")]);
        let before = history.turns().to_vec();

        history.record_exchange("Price?", "It depends.");

        assert_eq!(history.len(), 4);
        assert_eq!(&history.turns()[..2], before.as_slice());
        assert_eq!(history.turns()[2], Turn::user("Price?"));
        assert_eq!(history.turns()[3], Turn::assistant("It depends."));
    }

    #[test]
    fn test_history_serializes_as_plain_list() {
        let history = History::from(vec![Turn::user("Hi")]);
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json, serde_json::json!([{"role": "user", "content": "Hi"}]));
    }
}
