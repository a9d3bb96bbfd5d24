//! Session and chat history storage
//!
//! Sessions are append-only message logs keyed by session id. The
//! [`SessionStore`] trait is the full capability surface every backend
//! provides; [`InMemorySessionStore`] is the process-local implementation
//! used by the CLI and the HTTP server.

pub mod types;

pub use types::{ChatMessage, ChatSession, Role, SessionInfo};

use crate::error::{DslsmithError, Result};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// System message written into every new session
pub const SEED_SYSTEM_MESSAGE: &str =
    "You are an assistant for generating code that conforms to a given grammar.";

/// Storage backend for chat sessions
///
/// Appends to one session are serialized by the backend. Reads return
/// snapshots; callers never hold a reference into the store.
pub trait SessionStore: Send + Sync {
    /// Fetch a session, creating it (with the seed message) when unknown
    ///
    /// The language is bound only when the session is created.
    fn get_or_create(&self, session_id: &str, language: Option<&str>) -> Result<ChatSession>;

    /// Snapshot of a session, `None` when unknown
    fn get(&self, session_id: &str) -> Result<Option<ChatSession>>;

    /// Append one message
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` when the session does not exist
    fn append(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        self.append_all(session_id, vec![(role, content.to_string())])
    }

    /// Append several messages as one step; no other append interleaves
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` when the session does not exist
    fn append_all(&self, session_id: &str, messages: Vec<(Role, String)>) -> Result<()>;

    /// Messages for a new request context, see [`ChatSession::messages_for_context`]
    ///
    /// Unknown sessions yield an empty history.
    fn history(&self, session_id: &str, max_messages: usize) -> Result<Vec<ChatMessage>>;

    /// Remove a session; `false` when it did not exist
    fn delete(&self, session_id: &str) -> Result<bool>;

    /// Number of live sessions
    fn count(&self) -> Result<usize>;

    /// Summaries of all live sessions, oldest first
    fn list(&self) -> Result<Vec<SessionInfo>>;

    /// Remove every session
    fn clear(&self) -> Result<()>;

    /// Evict sessions idle past the store's timeout; returns how many
    fn cleanup_expired(&self) -> Result<usize>;

    /// Serialize one session to JSON
    fn export(&self, session_id: &str) -> Result<String>;

    /// Load a session from JSON, replacing any session with the same id
    ///
    /// Returns the imported session id.
    fn import(&self, json: &str) -> Result<String>;
}

type SessionHandle = Arc<Mutex<ChatSession>>;

/// Process-local session store
///
/// The map lock is held only to look up or insert handles; each session has
/// its own mutex so appends to different sessions never contend.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    timeout: Duration,
}

fn lock_poisoned<E>(_: E) -> anyhow::Error {
    DslsmithError::Session("session store lock poisoned".to_string()).into()
}

impl InMemorySessionStore {
    /// Create a store that evicts sessions idle for `timeout_seconds`
    pub fn new(timeout_seconds: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout: i64::try_from(timeout_seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
        }
    }

    fn handle(&self, session_id: &str) -> Result<Option<SessionHandle>> {
        let sessions = self.sessions.read().map_err(lock_poisoned)?;
        Ok(sessions.get(session_id).cloned())
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_or_create(&self, session_id: &str, language: Option<&str>) -> Result<ChatSession> {
        if session_id.trim().is_empty() {
            return Err(DslsmithError::InvalidInput("session id cannot be empty".to_string()).into());
        }

        let handle = match self.handle(session_id)? {
            Some(handle) => handle,
            None => {
                let mut sessions = self.sessions.write().map_err(lock_poisoned)?;
                sessions
                    .entry(session_id.to_string())
                    .or_insert_with(|| {
                        tracing::info!(session_id, "Created chat session");
                        let mut session =
                            ChatSession::new(session_id, language.map(str::to_string));
                        session.push(Role::System, SEED_SYSTEM_MESSAGE);
                        Arc::new(Mutex::new(session))
                    })
                    .clone()
            }
        };

        let mut session = handle.lock().map_err(lock_poisoned)?;
        session.touch();
        Ok(session.clone())
    }

    fn get(&self, session_id: &str) -> Result<Option<ChatSession>> {
        let Some(handle) = self.handle(session_id)? else {
            return Ok(None);
        };
        let session = handle.lock().map_err(lock_poisoned)?.clone();
        Ok(Some(session))
    }

    fn append_all(&self, session_id: &str, messages: Vec<(Role, String)>) -> Result<()> {
        let handle = self
            .handle(session_id)?
            .ok_or_else(|| DslsmithError::SessionNotFound(session_id.to_string()))?;
        let mut session = handle.lock().map_err(lock_poisoned)?;
        for (role, content) in messages {
            session.push(role, content);
        }
        tracing::debug!(
            session_id,
            message_count = session.messages.len(),
            "Appended to chat session"
        );
        Ok(())
    }

    fn history(&self, session_id: &str, max_messages: usize) -> Result<Vec<ChatMessage>> {
        let Some(handle) = self.handle(session_id)? else {
            return Ok(Vec::new());
        };
        let window = handle
            .lock()
            .map_err(lock_poisoned)?
            .messages_for_context(max_messages);
        Ok(window)
    }

    fn delete(&self, session_id: &str) -> Result<bool> {
        let mut sessions = self.sessions.write().map_err(lock_poisoned)?;
        let removed = sessions.remove(session_id).is_some();
        if removed {
            tracing::info!(session_id, "Deleted chat session");
        }
        Ok(removed)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.sessions.read().map_err(lock_poisoned)?.len())
    }

    fn list(&self) -> Result<Vec<SessionInfo>> {
        let handles: Vec<SessionHandle> = self
            .sessions
            .read()
            .map_err(lock_poisoned)?
            .values()
            .cloned()
            .collect();

        let mut infos = Vec::with_capacity(handles.len());
        for handle in handles {
            infos.push(handle.lock().map_err(lock_poisoned)?.info());
        }
        infos.sort_by_key(|info| info.created_at);
        Ok(infos)
    }

    fn clear(&self) -> Result<()> {
        self.sessions.write().map_err(lock_poisoned)?.clear();
        Ok(())
    }

    fn cleanup_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let timeout = self.timeout;
        let mut sessions = self.sessions.write().map_err(lock_poisoned)?;
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.lock() {
            Ok(session) => !session.is_expired(now, timeout),
            Err(_) => false,
        });
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!("Evicted {} expired chat sessions", removed);
        }
        Ok(removed)
    }

    fn export(&self, session_id: &str) -> Result<String> {
        let session = self
            .get(session_id)?
            .ok_or_else(|| DslsmithError::SessionNotFound(session_id.to_string()))?;
        Ok(serde_json::to_string_pretty(&session)?)
    }

    fn import(&self, json: &str) -> Result<String> {
        let session: ChatSession = serde_json::from_str(json)?;
        if session.session_id.trim().is_empty() {
            return Err(DslsmithError::InvalidInput("session id cannot be empty".to_string()).into());
        }
        let session_id = session.session_id.clone();
        self.sessions
            .write()
            .map_err(lock_poisoned)?
            .insert(session_id.clone(), Arc::new(Mutex::new(session)));
        Ok(session_id)
    }
}
