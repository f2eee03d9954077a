//! Service Kit - Agent Tools
//!
//! Domain-specific tools that implement `agent_core::Tool` for the event concierge.

mod calendar_lookup;
mod knowledge_search;

pub use calendar_lookup::CalendarLookupTool;
pub use knowledge_search::KnowledgeSearchTool;
