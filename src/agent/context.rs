//! Per-request input bundle shared by the agents

use crate::library::Example;
use crate::providers::Message;
use crate::storage::{ChatMessage, Role};
use serde::{Deserialize, Serialize};

/// One turn of conversation visible to the agents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Author of the turn
    pub role: Role,
    /// Turn text
    pub content: String,
}

impl HistoryEntry {
    /// Build an entry
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Provider message for this turn
    pub fn to_message(&self) -> Message {
        Message::new(self.role.as_str(), self.content.clone())
    }
}

impl From<&ChatMessage> for HistoryEntry {
    fn from(message: &ChatMessage) -> Self {
        Self::new(message.role, message.content.clone())
    }
}

/// Snapshot handed to the generator and validator
///
/// Built fresh for every request. The history only grows: turns are added
/// with [`AgentContext::push_turn`] and never removed or edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    /// Session the request belongs to
    pub session_id: String,
    /// Target language identifier
    pub language: String,
    /// The request being answered
    pub user_message: String,
    chat_history: Vec<HistoryEntry>,
    /// Few-shot examples; looked up by the generator when absent
    pub examples: Option<Vec<Example>>,
    /// Grammar text; looked up by the generator when absent
    pub grammar: Option<String>,
    /// Generate/validate pairs allowed for the request
    pub max_iterations: usize,
}

impl AgentContext {
    /// Create a context with empty history
    pub fn new(
        session_id: impl Into<String>,
        language: impl Into<String>,
        user_message: impl Into<String>,
        max_iterations: usize,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            language: language.into(),
            user_message: user_message.into(),
            chat_history: Vec::new(),
            examples: None,
            grammar: None,
            max_iterations,
        }
    }

    /// Seed the history (e.g. from the session store)
    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.chat_history = history;
        self
    }

    /// Attach examples
    pub fn with_examples(mut self, examples: Vec<Example>) -> Self {
        self.examples = Some(examples);
        self
    }

    /// Attach a grammar
    pub fn with_grammar(mut self, grammar: impl Into<String>) -> Self {
        self.grammar = Some(grammar.into());
        self
    }

    /// Turns in chronological order
    pub fn chat_history(&self) -> &[HistoryEntry] {
        &self.chat_history
    }

    /// Append a turn
    pub fn push_turn(&mut self, role: Role, content: impl Into<String>) {
        self.chat_history.push(HistoryEntry::new(role, content));
    }

    /// Content of the newest assistant turn
    pub fn last_assistant(&self) -> Option<&str> {
        self.chat_history
            .iter()
            .rev()
            .find(|entry| entry.role == Role::Assistant)
            .map(|entry| entry.content.as_str())
    }
}
