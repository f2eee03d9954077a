//! # agent-runtime
//!
//! Runtime providers for the event concierge agent.
//!
//! ## Providers
//!
//! - **Ollama** (default): Local LLM inference via Ollama
//! - **Gemini**: Google Gemini REST API with native function calling
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::ProviderSelection;
//!
//! let selection = ProviderSelection::from_env()?;
//! let graph = AgentGraph::new(selection.provider, tools, config.with_model(selection.model));
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::GeminiProvider;
#[cfg(feature = "ollama")]
pub use ollama::OllamaProvider;

use std::sync::Arc;

// Re-export core types for convenience
pub use agent_core::{AgentError, LlmProvider, Result, Role, Turn};

/// Which backend to talk to (`LLM_PROVIDER`)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Ollama,
    Gemini,
}

impl std::str::FromStr for ProviderKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(AgentError::Config(format!("unknown LLM_PROVIDER '{other}'"))),
        }
    }
}

/// A constructed provider plus the model it should be asked for
pub struct ProviderSelection {
    pub kind: ProviderKind,
    pub provider: Arc<dyn LlmProvider>,
    pub model: String,
}

impl ProviderSelection {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the provider named by `LLM_PROVIDER` (default `ollama`)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let kind = lookup("LLM_PROVIDER")
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or(ProviderKind::Ollama);

        match kind {
            #[cfg(feature = "ollama")]
            ProviderKind::Ollama => {
                let config = ollama::OllamaConfig::from_lookup(&lookup);
                tracing::info!(host = %config.host, port = config.port, model = %config.model, "Using Ollama provider");
                let model = config.model.clone();
                Ok(Self {
                    kind,
                    provider: Arc::new(OllamaProvider::from_config(config)),
                    model,
                })
            }
            #[cfg(feature = "gemini")]
            ProviderKind::Gemini => {
                let config = gemini::GeminiConfig::from_lookup(&lookup)?;
                tracing::info!(model = %config.model, "Using Gemini provider");
                let model = config.model.clone();
                Ok(Self {
                    kind,
                    provider: Arc::new(GeminiProvider::from_config(config)),
                    model,
                })
            }
            #[allow(unreachable_patterns)]
            other => Err(AgentError::Config(format!(
                "provider {other:?} is not compiled into this build"
            ))),
        }
    }
}
