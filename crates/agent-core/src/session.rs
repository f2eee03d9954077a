//! Session Management
//!
//! Session memory adapter: load/save the ordered history of a session.
//! Persistent backends implement [`SessionStore`]; [`MemorySessionStore`] is
//! the in-process default.
//!
//! Stores are not expected to serialize turns of the same session. Two
//! interleaved turns on one id resolve as last write wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::message::History;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier
    pub id: SessionId,

    /// Conversation history
    pub history: History,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last write timestamp
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create an empty session
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            history: History::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Session store trait for persistence
///
/// Failures must be reported as [`crate::AgentError::Persistence`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the history of a session; unknown ids yield an empty history
    async fn load(&self, id: &SessionId) -> Result<History>;

    /// Overwrite the stored history of a session
    async fn save(&self, id: &SessionId, history: &History) -> Result<()>;

    /// Allocate an id for a new session
    fn new_session_id(&self) -> SessionId {
        SessionId::new()
    }
}

/// In-memory session store (for development/testing)
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a full session record
    pub async fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Number of stored sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<History> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(id)
            .map(|s| s.history.clone())
            .unwrap_or_default())
    }

    async fn save(&self, id: &SessionId, history: &History) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(id.clone())
            .or_insert_with(|| Session::new(id.clone()));
        session.history = history.clone();
        session.touch();
        Ok(())
    }
}
