//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference. Ollama has no
//! native function calling here, so tool selection uses the prompt-based
//! default of [`LlmProvider::decide`].

use agent_core::{
    error::{AgentError, Result},
    message::{Role, Turn},
    provider::{Completion, FinishReason, GenerationOptions, LlmProvider, ModelInfo},
};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, MessageRole, request::ChatMessageRequest},
    models::ModelOptions,
};

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Model used when the caller does not pick one
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            model: "llama3.2".into(),
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `OLLAMA_HOST`, `OLLAMA_PORT` and `OLLAMA_MODEL` from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("OLLAMA_HOST").unwrap_or(defaults.host),
            port: lookup("OLLAMA_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            model: lookup("OLLAMA_MODEL").unwrap_or(defaults.model),
        }
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create a new Ollama provider with custom host/port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::from_config(OllamaConfig {
            host: host.into(),
            port,
            ..Default::default()
        })
    }

    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Self {
        Self {
            client: Ollama::new(config.host.clone(), config.port),
            config,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::from_config(OllamaConfig::from_env())
    }

    /// Convert turns to Ollama format
    fn convert_turns(turns: &[Turn]) -> Vec<ChatMessage> {
        turns
            .iter()
            .map(|t| {
                let role = match t.role() {
                    Role::System => MessageRole::System,
                    Role::User => MessageRole::User,
                    Role::Assistant => MessageRole::Assistant,
                };
                ChatMessage::new(role, t.content().to_string())
            })
            .collect()
    }

    /// Build Ollama generation options
    fn build_options(opts: &GenerationOptions) -> ModelOptions {
        ModelOptions::default()
            .temperature(opts.temperature)
            .top_p(opts.top_p)
            .num_predict(i32::try_from(opts.max_tokens).unwrap_or(i32::MAX))
    }

    fn model_for<'a>(&'a self, options: &'a GenerationOptions) -> &'a str {
        if options.model.is_empty() {
            &self.config.model
        } else {
            &options.model
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(&self, turns: &[Turn], options: &GenerationOptions) -> Result<Completion> {
        let model = self.model_for(options).to_string();
        let request = ChatMessageRequest::new(model.clone(), Self::convert_turns(turns))
            .options(Self::build_options(options));

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AgentError::ModelUnavailable(format!("Ollama: {e}")))?;

        Ok(Completion {
            content: response.message.content,
            model,
            usage: None,
            finish_reason: Some(FinishReason::Stop),
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let models = self
            .client
            .list_local_models()
            .await
            .map_err(|e| AgentError::ModelUnavailable(format!("Ollama: {e}")))?;

        Ok(models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.clone(),
                name: m.name,
            })
            .collect())
    }
}
