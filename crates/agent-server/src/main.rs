//! Event concierge HTTP server
//!
//! Axum-based server exposing the chat endpoint and a health report.
//!
//! Wiring: knowledge index + Google Calendar → tool registry → agent graph
//! (Ollama or Gemini) → turn handler with in-memory sessions.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{AgentGraph, MemorySessionStore, ToolRegistry, TurnHandler};
use agent_runtime::ProviderSelection;
use event_concierge::{ChunkConfig, GoogleCalendarClient, InMemoryIndex, KnowledgeIndex};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment before reading RUST_LOG
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    tracing::debug!(?config, "Server configuration");

    // Initialize LLM provider
    let selection = ProviderSelection::from_env()?;
    match selection.provider.health_check().await {
        Ok(true) => tracing::info!("✓ Connected to {}", selection.provider.name()),
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ {} not reachable - chat requests will fail with 503", selection.provider.name());
        }
    }

    // Knowledge base
    let index: Arc<dyn KnowledgeIndex> =
        match InMemoryIndex::from_markdown_file(&config.knowledge_path, &ChunkConfig::default()) {
            Ok(index) => Arc::new(index),
            Err(e) => {
                tracing::warn!(error = %e, "⚠ Knowledge base unavailable - searches will find nothing");
                Arc::new(InMemoryIndex::empty())
            }
        };
    let knowledge_chunks = index.len();

    // Calendar
    let calendar = Arc::new(GoogleCalendarClient::from_env());
    if calendar.credentials().is_configured().await {
        tracing::info!("✓ Google Calendar credentials loaded");
    }

    // Initialize tools
    let mut tools = ToolRegistry::new();
    event_concierge::register_tools(&mut tools, index, calendar)?;

    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    // Agent graph and turn handling
    let mut graph_config = event_concierge::graph_config().with_model(selection.model.clone());
    graph_config.model_timeout = config.model_timeout;
    graph_config.tool_timeout = config.tool_timeout;

    let graph = AgentGraph::new(selection.provider, Arc::new(tools), graph_config);
    let turns = TurnHandler::new(Arc::new(graph), Arc::new(MemorySessionStore::new()));

    if config.api_key.is_none() {
        tracing::warn!("⚠ BACKEND_API_KEY not set - chat requests will be refused");
    }

    // Build application state
    let state = AppState {
        turns: Arc::new(turns),
        api_key: config.api_key.as_deref().map(Arc::from),
        knowledge_chunks,
    };

    // CORS configuration
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| {
            origin
                .parse()
                .inspect_err(|_| tracing::warn!(%origin, "Ignoring invalid CORS origin"))
                .ok()
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(handlers::API_KEY_HEADER)])
        .allow_credentials(true);

    // Build router
    let app = handlers::routes(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 event concierge running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health       - Health check");
    tracing::info!("  POST /api/chatbot  - Send message (X-API-Key)");

    axum::serve(listener, app).await?;

    Ok(())
}
