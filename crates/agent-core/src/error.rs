//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
///
/// Only [`AgentError::InvalidInput`], [`AgentError::ModelUnavailable`] and
/// [`AgentError::Persistence`] ever escape a turn. Tool-level variants are
/// folded into the tool output text, and synthesis failures fall back to a
/// default generation.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Malformed inbound request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Language model unreachable, erroring or timed out
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Tool not found in registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool arguments did not match the tool's schema
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Tool backend did not answer in time
    #[error("Tool unavailable: {0}")]
    ToolUnavailable(String),

    /// Synthesis output did not match the reply contract
    #[error("Malformed synthesis: {0}")]
    MalformedSynthesis(String),

    /// Session store failed to load or save
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Whether the caller sent something we refuse to process
    pub fn is_client_error(&self) -> bool {
        matches!(self, AgentError::InvalidInput(_) | AgentError::Auth(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::InvalidInput(msg) => format!("Invalid request: {msg}"),
            AgentError::ModelUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            AgentError::UnknownTool(name) => format!("The tool '{name}' is not available."),
            AgentError::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            AgentError::ToolExecution(msg) => format!("Tool error: {msg}"),
            AgentError::ToolUnavailable(_) => "A required service did not respond in time.".into(),
            AgentError::Persistence(_) => {
                "Your conversation could not be saved. Please try again.".into()
            }
            AgentError::Auth(_) => "Authentication failed. Please check your credentials.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}
