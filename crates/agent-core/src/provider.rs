//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for all LLM providers (Ollama, Gemini, etc.)
//! allowing the agent graph to work with any backend without code changes.
//!
//! A provider needs two capabilities:
//!
//! - `complete` - plain text generation, used by response synthesis
//! - `decide` - tool selection, used by the decision step
//!
//! Providers without native function calling get `decide` for free: the tool
//! descriptions are appended to the system prompt and fenced `tool` blocks are
//! parsed from the completion.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{LlmProvider, GenerationOptions};
//!
//! let provider = OllamaProvider::from_env();
//! let completion = provider.complete(&turns, &GenerationOptions::default()).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{Role, Turn};
use crate::tool::{ToolCall, ToolSchema, parse_tool_calls, render_tool_prompt};

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "llama3.2", "gemini-1.5-pro")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_temperature() -> f32 { 0.7 }
fn default_max_tokens() -> u32 { 2048 }
fn default_top_p() -> f32 { 0.9 }

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "llama3.2".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
        }
    }
}

impl GenerationOptions {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Response from an LLM completion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            usage: None,
            finish_reason: Some(FinishReason::Stop),
        }
    }
}

/// Token usage statistics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Error,
}

/// Information about a model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// Every failure should surface as [`crate::AgentError::ModelUnavailable`].
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs and health reports
    fn name(&self) -> &str;

    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Generate a completion from turns
    async fn complete(&self, turns: &[Turn], options: &GenerationOptions) -> Result<Completion>;

    /// Ask the model which tools, if any, it wants to call
    async fn decide(
        &self,
        turns: &[Turn],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Vec<ToolCall>> {
        if tools.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = with_tool_prompt(turns, tools);
        let completion = self.complete(&prompt, options).await?;
        Ok(parse_tool_calls(&completion.content))
    }

    /// List available models
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}

/// Fold the tool descriptions into the leading system turn (or add one).
fn with_tool_prompt(turns: &[Turn], tools: &[ToolSchema]) -> Vec<Turn> {
    let section = render_tool_prompt(tools);
    let mut out = Vec::with_capacity(turns.len() + 1);

    match turns.split_first() {
        Some((first, rest)) if first.role() == Role::System => {
            out.push(Turn::system(format!("{}\n\n{section}", first.content())));
            out.extend_from_slice(rest);
        }
        _ => {
            out.push(Turn::system(section));
            out.extend_from_slice(turns);
        }
    }

    out
}
