//! # agent-core
//!
//! Core agent logic: a provider-agnostic LLM abstraction, a tool registry and
//! the single-pass agent graph that answers one chat turn.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           TurnHandler                            │
//! │  ┌──────────────┐   ┌──────────────────────────────────────────┐ │
//! │  │ SessionStore │   │               AgentGraph                 │ │
//! │  │ (load/save)  │   │  agent ──▶ tools? ──▶ responder          │ │
//! │  └──────────────┘   │    │          │           │              │ │
//! │                     │    ▼          ▼           ▼              │ │
//! │                     │ LlmProvider ToolRegistry  synthesis      │ │
//! │                     └──────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between Ollama, Gemini, or any
//! other provider without changing the graph.

pub mod error;
pub mod graph;
pub mod message;
pub mod provider;
pub mod session;
pub mod synthesis;
pub mod tool;
pub mod turn;

pub use error::{AgentError, Result};
pub use graph::{AgentGraph, AgentState, GraphConfig};
pub use message::{History, Role, Turn};
pub use provider::LlmProvider;
pub use session::{MemorySessionStore, SessionId, SessionStore};
pub use synthesis::{EventType, FormData, Generation};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
pub use turn::{TurnHandler, TurnRequest, TurnResponse};
