//! Server Configuration
//!
//! Read from the environment (after `.env` is loaded by `dotenvy`).

use std::path::PathBuf;
use std::time::Duration;

use agent_core::{AgentError, Result};

const DEFAULT_ORIGINS: &[&str] = &[
    "http://localhost",
    "http://localhost:3000",
    "http://localhost:5173",
];

#[derive(Clone)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Shared secret for `X-API-Key`; chat requests fail with 500 while unset
    pub api_key: Option<String>,

    pub allowed_origins: Vec<String>,

    pub knowledge_path: PathBuf,

    pub model_timeout: Duration,

    pub tool_timeout: Duration,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .field("allowed_origins", &self.allowed_origins)
            .field("knowledge_path", &self.knowledge_path)
            .field("model_timeout", &self.model_timeout)
            .field("tool_timeout", &self.tool_timeout)
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let allowed_origins = lookup("ALLOWED_ORIGINS").map_or_else(
            || DEFAULT_ORIGINS.iter().map(|o| (*o).to_string()).collect(),
            |raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            },
        );

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".into()),
            api_key: lookup("BACKEND_API_KEY").filter(|k| !k.is_empty()),
            allowed_origins,
            knowledge_path: lookup("KNOWLEDGE_PATH")
                .map_or_else(|| PathBuf::from("docs/info_eventos.md"), PathBuf::from),
            model_timeout: seconds(&lookup, "MODEL_TIMEOUT_SECS", 60)?,
            tool_timeout: seconds(&lookup, "TOOL_TIMEOUT_SECS", 20)?,
        })
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration> {
    match lookup(key) {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| AgentError::Config(format!("{key} must be a positive number of seconds, got '{raw}'"))),
    }
}
