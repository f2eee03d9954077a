//! Gemini LLM Provider
//!
//! Implementation of `LlmProvider` over the Gemini `generateContent` REST
//! endpoint. Tool selection uses native function calling instead of the
//! prompt-based default.

use agent_core::{
    error::{AgentError, Result},
    message::{Role, Turn},
    provider::{Completion, FinishReason, GenerationOptions, LlmProvider, ModelInfo, TokenUsage},
    tool::{ToolCall, ToolSchema},
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini provider configuration
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "gemini-1.5-flash".into(),
            base_url: DEFAULT_BASE_URL.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `GEMINI_API_KEY` (required), `GEMINI_MODEL`, `GEMINI_BASE_URL`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("GEMINI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::Config("GEMINI_API_KEY is not set".into()))?;

        let mut config = Self::new(api_key);
        if let Some(model) = lookup("GEMINI_MODEL") {
            config.model = bare_model(&model).to_string();
        }
        if let Some(base_url) = lookup("GEMINI_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        Ok(config)
    }
}

/// Model ids are accepted with or without the API's `models/` prefix
fn bare_model(name: &str) -> &str {
    name.strip_prefix("models/").unwrap_or(name)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    function_call: Option<FunctionCall>,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Option<serde_json::Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntry {
    name: String,
    display_name: Option<String>,
}

/// Gemini LLM provider
pub struct GeminiProvider {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn from_config(config: GeminiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self> {
        GeminiConfig::from_env().map(Self::from_config)
    }

    /// Leading system turns become the system instruction; later ones are
    /// sent as user context. Adjacent turns of the same role are merged.
    fn build_contents(turns: &[Turn]) -> (Option<Value>, Vec<Value>) {
        let leading = turns.iter().take_while(|t| t.role() == Role::System).count();
        let (system, rest) = turns.split_at(leading);

        let instruction = (!system.is_empty()).then(|| {
            let parts: Vec<Value> = system.iter().map(|t| json!({ "text": t.content() })).collect();
            json!({ "parts": parts })
        });

        let mut contents: Vec<(&str, Vec<Value>)> = Vec::new();
        for turn in rest {
            let role = match turn.role() {
                Role::Assistant => "model",
                Role::System | Role::User => "user",
            };
            let part = json!({ "text": turn.content() });
            match contents.last_mut() {
                Some((last_role, parts)) if *last_role == role => parts.push(part),
                _ => contents.push((role, vec![part])),
            }
        }

        let contents = contents
            .into_iter()
            .map(|(role, parts)| json!({ "role": role, "parts": parts }))
            .collect();
        (instruction, contents)
    }

    fn build_body(turns: &[Turn], tools: &[ToolSchema], options: &GenerationOptions) -> Value {
        let (instruction, contents) = Self::build_contents(turns);

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": options.temperature,
                "topP": options.top_p,
                "maxOutputTokens": options.max_tokens,
            },
        });

        if let Some(instruction) = instruction {
            body["systemInstruction"] = instruction;
        }

        if !tools.is_empty() {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters_json_schema(),
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        body
    }

    fn model_for<'a>(&'a self, options: &'a GenerationOptions) -> &'a str {
        if options.model.is_empty() {
            &self.config.model
        } else {
            bare_model(&options.model)
        }
    }

    async fn generate(&self, model: &str, body: &Value) -> Result<GenerateResponse> {
        let url = format!("{}/v1beta/models/{model}:generateContent", self.config.base_url);
        tracing::debug!(model, "Gemini generateContent");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AgentError::ModelUnavailable(format!("Gemini: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::ModelUnavailable(format!("Gemini returned {status}: {text}")));
        }

        response
            .json()
            .await
            .map_err(|e| AgentError::ModelUnavailable(format!("Gemini: unreadable response: {e}")))
    }
}

fn first_candidate(response: GenerateResponse) -> Result<(Candidate, Option<UsageMetadata>)> {
    let usage = response.usage_metadata;
    response
        .candidates
        .into_iter()
        .next()
        .map(|c| (c, usage))
        .ok_or_else(|| AgentError::ModelUnavailable("Gemini returned no candidates".into()))
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn health_check(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Gemini health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(&self, turns: &[Turn], options: &GenerationOptions) -> Result<Completion> {
        let model = self.model_for(options).to_string();
        let body = Self::build_body(turns, &[], options);
        let (candidate, usage) = first_candidate(self.generate(&model, &body).await?)?;

        let content: String = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        let finish_reason = match candidate.finish_reason.as_deref() {
            Some("STOP") => Some(FinishReason::Stop),
            Some("MAX_TOKENS") => Some(FinishReason::Length),
            Some("SAFETY") => Some(FinishReason::ContentFilter),
            _ => None,
        };

        Ok(Completion {
            content,
            model,
            usage: usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
            finish_reason,
        })
    }

    async fn decide(&self, turns: &[Turn], tools: &[ToolSchema], options: &GenerationOptions) -> Result<Vec<ToolCall>> {
        if tools.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model_for(options).to_string();
        let body = Self::build_body(turns, tools, options);
        let (candidate, _) = first_candidate(self.generate(&model, &body).await?)?;

        Ok(candidate
            .content
            .parts
            .into_iter()
            .filter_map(|p| p.function_call)
            .map(|fc| {
                let mut call = ToolCall::new(fc.name);
                call.arguments = fc.args.unwrap_or_default().into_iter().collect();
                call.id = Some(uuid::Uuid::new_v4().to_string());
                call
            })
            .collect())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/v1beta/models", self.config.base_url);
        let response = self
            .http
            .get(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| AgentError::ModelUnavailable(format!("Gemini: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::ModelUnavailable(format!("Gemini returned {status}")));
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| AgentError::ModelUnavailable(format!("Gemini: unreadable model list: {e}")))?;

        Ok(list
            .models
            .into_iter()
            .map(|m| {
                let id = m.name.trim_start_matches("models/").to_string();
                ModelInfo {
                    name: m.display_name.unwrap_or_else(|| id.clone()),
                    id,
                }
            })
            .collect())
    }
}
