//! # event-concierge
//!
//! Domain layer for the NonaEventos assistant: the persona prompts plus the
//! two tools the agent graph may call.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  search_event_info    → KnowledgeIndex (chunked docs)      │
//! │  get_calendar_events  → CalendarClient (Google Calendar)   │
//! │                                 └─ CredentialProvider      │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both backends sit behind traits so tests and demos can swap in
//! [`InMemoryIndex`] documents or a [`calendar::StaticCalendar`].

pub mod calendar;
pub mod error;
pub mod knowledge;
pub mod svckit;

use std::sync::Arc;

use agent_core::{GraphConfig, ToolRegistry};

pub use calendar::{CalendarClient, CalendarEvent, CredentialProvider, GoogleCalendarClient};
pub use error::{ConciergeError, Result};
pub use knowledge::{ChunkConfig, InMemoryIndex, KnowledgeIndex};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{CalendarLookupTool, KnowledgeSearchTool};
}

/// System prompt for the tool-selection step
pub const DECISION_PROMPT: &str = "You are a virtual assistant for NonaEventos. Respond to user \
questions in a friendly and helpful manner. You can use the available tools to get information: \
search the company information for anything about services, packages or prices, and check the \
calendar when the user asks about availability or dates.";

/// Persona for the final answer; the extraction contract is appended by the graph
pub const SYNTHESIS_PROMPT: &str = r"You are a virtual assistant for NonaEventos. Your goal is twofold:
1.  **Converse politely**: Answer the user's question based on the history and the output of the tools.
2.  **Extract data**: Fill out a form with the information provided by the user.";

/// Graph configuration with the NonaEventos prompts
pub fn graph_config() -> GraphConfig {
    GraphConfig {
        decision_prompt: DECISION_PROMPT.into(),
        synthesis_prompt: SYNTHESIS_PROMPT.into(),
        ..GraphConfig::default()
    }
}

/// Register the knowledge search and calendar lookup tools
pub fn register_tools(
    registry: &mut ToolRegistry,
    index: Arc<dyn KnowledgeIndex>,
    calendar: Arc<dyn CalendarClient>,
) -> agent_core::Result<()> {
    registry.register(tools::KnowledgeSearchTool::new(index))?;
    registry.register(tools::CalendarLookupTool::new(calendar))?;
    Ok(())
}
