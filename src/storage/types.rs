use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions and validation feedback
    System,
    /// The person asking for code
    User,
    /// Generated code
    Assistant,
}

impl Role {
    /// Wire name used by LLM providers
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable entry of a session log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message
    pub role: Role,
    /// Message text
    pub content: String,
    /// When the message was appended
    pub timestamp: DateTime<Utc>,
    /// Owning session
    pub session_id: String,
}

/// Append-only message log for one conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique identifier
    pub session_id: String,
    /// Messages in chronological order
    pub messages: Vec<ChatMessage>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last append or lookup through `get_or_create`
    pub last_activity: DateTime<Utc>,
    /// Language the session was opened for
    #[serde(default)]
    pub language: Option<String>,
}

impl ChatSession {
    /// Create an empty session
    pub fn new(session_id: impl Into<String>, language: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            created_at: now,
            last_activity: now,
            language,
        }
    }

    /// Append a message and refresh `last_activity`
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        let now = Utc::now();
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
            timestamp: now,
            session_id: self.session_id.clone(),
        });
        self.last_activity = now;
    }

    /// Refresh `last_activity` without appending
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Messages to include in a new request context
    ///
    /// Returns the whole log when it has at most `max_messages` entries.
    /// Otherwise returns every system message plus the most recent
    /// non-system messages that fit in the remaining slots, in log order.
    pub fn messages_for_context(&self, max_messages: usize) -> Vec<ChatMessage> {
        if self.messages.len() <= max_messages {
            return self.messages.clone();
        }

        let system_count = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .count();
        let remaining = max_messages.saturating_sub(system_count);

        let recent: HashSet<usize> = self
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role != Role::System)
            .map(|(i, _)| i)
            .rev()
            .take(remaining)
            .collect();

        self.messages
            .iter()
            .enumerate()
            .filter(|(i, m)| m.role == Role::System || recent.contains(i))
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// True when the session has been idle longer than `timeout`
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_activity > timeout
    }

    /// Summary view of the session
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            language: self.language.clone(),
            message_count: self.messages.len(),
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}

/// Metadata for a stored session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Unique identifier for the session
    pub session_id: String,
    /// Language the session was opened for
    pub language: Option<String>,
    /// Number of messages in the session
    pub message_count: usize,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the session was last used
    pub last_activity: DateTime<Utc>,
}
