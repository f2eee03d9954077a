//! Turn Handling
//!
//! One inbound chat message end to end: load the session, run the graph,
//! append the exchange, save once.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::graph::AgentGraph;
use crate::session::{SessionId, SessionStore};
use crate::synthesis::FormData;

/// Inbound chat message
#[derive(Clone, Debug, Deserialize)]
pub struct TurnRequest {
    pub message: String,

    #[serde(default)]
    pub session_id: Option<String>,
}

impl TurnRequest {
    pub fn new(message: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            message: message.into(),
            session_id,
        }
    }
}

/// Answer to a chat message
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TurnResponse {
    pub reply: String,

    pub session_id: String,

    #[serde(rename = "formData")]
    pub form_data: FormData,
}

/// Runs chat turns against a graph and a session store
pub struct TurnHandler {
    graph: Arc<AgentGraph>,
    sessions: Arc<dyn SessionStore>,
}

impl TurnHandler {
    pub fn new(graph: Arc<AgentGraph>, sessions: Arc<dyn SessionStore>) -> Self {
        Self { graph, sessions }
    }

    /// Process one message
    ///
    /// A missing or blank `session_id` starts a new session. The store sees
    /// exactly one `save` per successful turn, carrying the full history.
    pub async fn handle(&self, request: TurnRequest) -> Result<TurnResponse> {
        if request.message.trim().is_empty() {
            return Err(AgentError::InvalidInput("message must not be empty".into()));
        }

        let existing = request
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(SessionId::from_string);

        let (session_id, mut history) = match existing {
            Some(id) => {
                let history = self.sessions.load(&id).await.map_err(into_persistence)?;
                tracing::info!(session = %id, turns = history.len(), "Loaded session history");
                (id, history)
            }
            None => {
                let id = self.sessions.new_session_id();
                tracing::info!(session = %id, "Created new session");
                (id, Default::default())
            }
        };

        let generation = self
            .graph
            .invoke(&request.message, history.turns().to_vec())
            .await
            .inspect_err(|e| tracing::error!(session = %session_id, error = %e, "Turn failed"))?;

        history.record_exchange(request.message, generation.reply.clone());
        self.sessions
            .save(&session_id, &history)
            .await
            .map_err(into_persistence)?;
        tracing::debug!(session = %session_id, turns = history.len(), "Saved session history");

        Ok(TurnResponse {
            reply: generation.reply,
            session_id: session_id.to_string(),
            form_data: generation.form_data,
        })
    }

    pub fn graph(&self) -> &AgentGraph {
        &self.graph
    }
}

fn into_persistence(err: AgentError) -> AgentError {
    match err {
        AgentError::Persistence(_) => err,
        other => AgentError::Persistence(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{ScriptedProvider, registry};
    use crate::message::{History, Turn};
    use crate::session::MemorySessionStore;
    use crate::tool::ToolCall;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn handler(provider: ScriptedProvider, store: Arc<dyn SessionStore>) -> TurnHandler {
        let graph = AgentGraph::with_defaults(Arc::new(provider), registry());
        TurnHandler::new(Arc::new(graph), store)
    }

    #[tokio::test]
    async fn test_new_session_end_to_end() {
        let decision = vec![ToolCall::new("search_event_info").with_arg("query", "wedding package price")];
        let provider = ScriptedProvider::new(
            decision,
            "```json\n{\"reply\": \"Our wedding packages start at $5,000.\", \"formData\": {}}\n```",
        );
        let store = Arc::new(MemorySessionStore::new());
        let handler = handler(provider, store.clone());

        let response = handler
            .handle(TurnRequest::new("What's the price of a wedding package?", None))
            .await
            .unwrap();

        assert!(response.reply.contains("$5,000"));
        assert!(response.form_data.is_empty());
        assert!(!response.session_id.is_empty());

        let saved = store.load(&SessionId::from_string(&response.session_id)).await.unwrap();
        assert_eq!(saved.turns(), &[
            Turn::user("What's the price of a wedding package?"),
            Turn::assistant("Our wedding packages start at $5,000."),
        ]);
    }

    #[tokio::test]
    async fn test_existing_session_appends_two_turns() {
        let store = Arc::new(MemorySessionStore::new());
        let id = SessionId::from_string("abc");
        let prior = History::from(vec![Turn::user("Hi, I'm Ana"), Turn::assistant("Hello Ana!")]);
        store.save(&id, &prior).await.unwrap();

        let provider = ScriptedProvider::new(
            Vec::new(),
            r#"{"reply": "Happy to help with your wedding!", "formData": {"name": "Ana", "eventType": "Wedding"}}"#,
        );
        let handler = handler(provider, store.clone());

        let response = handler
            .handle(TurnRequest::new("I'm planning a wedding", Some("abc".into())))
            .await
            .unwrap();

        assert_eq!(response.session_id, "abc");
        assert_eq!(response.form_data.name.as_deref(), Some("Ana"));

        let saved = store.load(&id).await.unwrap();
        assert_eq!(saved.len(), prior.len() + 2);
        assert_eq!(&saved.turns()[..prior.len()], prior.turns());
        assert_eq!(saved.turns()[3], Turn::assistant("Happy to help with your wedding!"));
    }

    #[tokio::test]
    async fn test_empty_message_is_invalid_input() {
        let store = Arc::new(MemorySessionStore::new());
        let handler = handler(ScriptedProvider::new(Vec::new(), "{}"), store.clone());

        let err = handler.handle(TurnRequest::new("   ", None)).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_model_failure_persists_nothing() {
        let provider = ScriptedProvider::scripted(
            vec![Err(AgentError::ModelUnavailable("down".into()))],
            Vec::new(),
        );
        let store = Arc::new(MemorySessionStore::new());
        let handler = handler(provider, store.clone());

        let err = handler.handle(TurnRequest::new("Hello", None)).await.unwrap_err();
        assert!(matches!(err, AgentError::ModelUnavailable(_)));
        assert!(store.is_empty().await);
    }

    /// Store whose writes always fail
    #[derive(Default)]
    struct BrokenStore {
        saves: AtomicUsize,
    }

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn load(&self, _id: &SessionId) -> Result<History> {
            Ok(History::new())
        }

        async fn save(&self, _id: &SessionId, _history: &History) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Err(AgentError::Other("quota exceeded".into()))
        }
    }

    #[tokio::test]
    async fn test_save_failure_is_persistence_error() {
        let store = Arc::new(BrokenStore::default());
        let provider = ScriptedProvider::new(Vec::new(), r#"{"reply": "Hi!", "formData": {}}"#);
        let handler = handler(provider, store.clone());

        let err = handler.handle(TurnRequest::new("Hello", Some("  ".into()))).await.unwrap_err();
        assert!(matches!(err, AgentError::Persistence(msg) if msg.contains("quota exceeded")));
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }
}
