//! HTTP Handlers

use axum::{
    Json, Router,
    extract::{Request, State, rejection::JsonRejection},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use subtle::ConstantTimeEq;

use agent_core::{AgentError, TurnRequest, TurnResponse};

use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model_provider: String,
    pub model_connected: bool,
    pub tools: Vec<String>,
    pub knowledge_chunks: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Error half of every handler result
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                code: code.into(),
            },
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        let (status, code) = match &err {
            AgentError::Auth(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            e if e.is_client_error() => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            AgentError::ModelUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "MODEL_UNAVAILABLE"),
            AgentError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(error = %err, code, "Request failed");
        } else {
            tracing::warn!(error = %err, code, "Request rejected");
        }
        Self::new(status, code, err.user_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Application routes; only the chat route is behind the API key
pub fn routes(state: AppState) -> Router {
    let chat = Router::new()
        .route("/api/chatbot", post(chat_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health_check))
        .merge(chat)
        .with_state(state)
}

// ============================================================================
// Middleware
// ============================================================================

/// Require `X-API-Key` to match the configured backend key
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        tracing::error!("BACKEND_API_KEY is not configured; refusing chat requests");
        return ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "SERVER_MISCONFIGURED",
            "Backend API key not configured on the server.",
        )
        .into_response();
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .map(|v| v.as_bytes())
        .unwrap_or_default();

    if !bool::from(provided.ct_eq(expected.as_bytes())) {
        return ApiError::from(AgentError::Auth("invalid or missing API key".into())).into_response();
    }

    next.run(request).await
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let graph = state.turns.graph();
    let model_connected = tokio::time::timeout(graph.config().model_timeout, graph.provider().health_check())
        .await
        .is_ok_and(|reachable| reachable.unwrap_or(false));

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model_provider: graph.provider().name().to_string(),
        model_connected,
        tools: graph.tools().names().into_iter().map(String::from).collect(),
        knowledge_chunks: state.knowledge_chunks,
    })
}

/// Chat endpoint: one conversational turn
pub async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Json<TurnResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        ApiError::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", rejection.body_text())
    })?;

    let response = state.turns.handle(request).await?;
    Ok(Json(response))
}
