//! Error Types for the Event Concierge

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConciergeError>;

#[derive(Error, Debug)]
pub enum ConciergeError {
    /// No usable calendar credential; callers answer with a sentinel instead
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Calendar API error: {0}")]
    CalendarApi(String),

    #[error("Credential error: {0}")]
    Credentials(String),

    #[error("Knowledge index error: {0}")]
    Knowledge(String),

    #[error("Search index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ConciergeError> for agent_core::AgentError {
    fn from(err: ConciergeError) -> Self {
        match err {
            ConciergeError::Config(msg) => agent_core::AgentError::Config(msg),
            other => agent_core::AgentError::ToolExecution(other.to_string()),
        }
    }
}
