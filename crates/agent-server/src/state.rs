//! Application State

use std::sync::Arc;

use agent_core::TurnHandler;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Runs one chat turn end to end (session load, graph, save)
    pub turns: Arc<TurnHandler>,

    /// Expected `X-API-Key`; `None` means the server is misconfigured
    pub api_key: Option<Arc<str>>,

    /// Passages in the knowledge index, for the health report
    pub knowledge_chunks: usize,
}
