//! Tool System
//!
//! Extensible tool framework for agent capabilities.
//! Tools are registered once at startup; the same registry feeds the decision
//! prompt and the execution dispatch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    #[serde(alias = "tool")]
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default, alias = "args")]
    pub arguments: HashMap<String, serde_json::Value>,

    /// Optional call ID for tracking
    #[serde(default)]
    pub id: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: HashMap::new(),
            id: None,
        }
    }

    /// Add an argument
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }
}

/// Result from tool execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Output (success message or error)
    pub output: String,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: true,
            output: output.into(),
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: false,
            output: error.into(),
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, integer, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,
}

impl ParameterSchema {
    /// Whether `value` is acceptable for this parameter's declared type.
    ///
    /// Integers may arrive as numeric strings; models are loose about that.
    fn accepts(&self, value: &serde_json::Value) -> bool {
        let type_ok = match self.param_type.as_str() {
            "string" => value.is_string(),
            "integer" => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0)
                    || value.as_str().is_some_and(|s| s.trim().parse::<i64>().is_ok())
            }
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        };

        type_ok
            && self
                .enum_values
                .as_ref()
                .is_none_or(|allowed| allowed.contains(value))
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSchema {
    /// Render the parameters as a JSON Schema object
    pub fn parameters_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut prop = serde_json::json!({
                "type": param.param_type,
                "description": param.description,
            });
            if let Some(values) = &param.enum_values {
                prop["enum"] = serde_json::Value::Array(values.clone());
            }
            properties.insert(param.name.clone(), prop);
            if param.required {
                required.push(serde_json::Value::String(param.name.clone()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;

    /// Validate arguments before execution
    fn validate(&self, call: &ToolCall) -> Result<()> {
        let schema = self.schema();

        for param in &schema.parameters {
            match call.arguments.get(&param.name) {
                None | Some(serde_json::Value::Null) if param.required => {
                    return Err(AgentError::ToolValidation(format!(
                        "Missing required parameter: {}",
                        param.name
                    )));
                }
                Some(value) if !value.is_null() && !param.accepts(value) => {
                    return Err(AgentError::ToolValidation(format!(
                        "Parameter '{}' expects {}, got {}",
                        param.name, param.param_type, value
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Registry for available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a new tool. Names must be unique.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_shared(Arc::new(tool))
    }

    /// Register a shared tool
    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.schema().name;
        if self.tools.contains_key(&name) {
            return Err(AgentError::Config(format!("Tool '{name}' registered twice")));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    /// Execute a tool call
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self.get(&call.name)?;

        // Validate first
        tool.validate(call)?;

        tool.execute(call).await
    }

    /// Get all tool schemas, ordered by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<_> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Get tool names, ordered
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Describe tools for providers without native function calling.
///
/// The model is asked to answer with one fenced `tool` block per call;
/// [`parse_tool_calls`] reads them back.
pub fn render_tool_prompt(schemas: &[ToolSchema]) -> String {
    let mut prompt = String::from("## Available Tools\n\n");
    prompt.push_str("If a tool is needed, respond ONLY with one JSON block per call:\n\n");
    prompt.push_str("```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n");
    prompt.push_str("If no tool is needed, answer with plain text and no tool block.\n\n");

    for schema in schemas {
        prompt.push_str(&format!("### {}\n", schema.name));
        prompt.push_str(&format!("{}\n", schema.description));

        if !schema.parameters.is_empty() {
            prompt.push_str("**Parameters:**\n");
            for param in &schema.parameters {
                let required = if param.required { " (required)" } else { "" };
                prompt.push_str(&format!(
                    "- `{}` ({}){}: {}\n",
                    param.name, param.param_type, required, param.description
                ));
            }
        }
        prompt.push('\n');
    }

    prompt
}

/// Extract every tool call from a model reply, in order of appearance.
pub fn parse_tool_calls(content: &str) -> Vec<ToolCall> {
    const TOOL_START: &str = "```tool";
    const FENCE: &str = "```";

    let mut calls = Vec::new();
    let mut rest = content;

    while let Some(start_idx) = rest.find(TOOL_START) {
        let after_marker = &rest[start_idx + TOOL_START.len()..];
        let Some(end_idx) = after_marker.find(FENCE) else {
            break;
        };

        let json_str = after_marker[..end_idx].trim();
        match serde_json::from_str::<ToolCall>(json_str) {
            Ok(call) => calls.push(call),
            Err(e) => tracing::debug!(error = %e, "Ignoring unparseable tool block"),
        }
        rest = &after_marker[end_idx + FENCE.len()..];
    }

    if calls.is_empty() {
        calls.extend(parse_inline_tool_call(content));
    }

    for call in &mut calls {
        if call.id.is_none() {
            call.id = Some(uuid::Uuid::new_v4().to_string());
        }
    }

    calls
}

/// Fallback for models that drop the fence and emit a bare JSON object.
fn parse_inline_tool_call(content: &str) -> Option<ToolCall> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;

    if end <= start {
        return None;
    }

    serde_json::from_str::<ToolCall>(&content[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "echo".into(),
                description: "Echo a value back".into(),
                parameters: vec![
                    ParameterSchema {
                        name: "text".into(),
                        param_type: "string".into(),
                        description: "Text to echo".into(),
                        required: true,
                        default: None,
                        enum_values: None,
                    },
                    ParameterSchema {
                        name: "times".into(),
                        param_type: "integer".into(),
                        description: "Repetitions".into(),
                        required: false,
                        default: Some(serde_json::json!(1)),
                        enum_values: None,
                    },
                ],
            }
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            let text = call.arguments.get("text").and_then(|v| v.as_str()).unwrap_or_default();
            Ok(ToolResult::success("echo", text))
        }
    }

    #[test]
    fn test_tool_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get("echo").is_ok());
        assert!(matches!(registry.get("unknown"), Err(AgentError::UnknownTool(name)) if name == "unknown"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();
        assert!(matches!(registry.register(EchoTool), Err(AgentError::Config(_))));
    }

    #[tokio::test]
    async fn test_execute_validates_arguments() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();

        let missing = ToolCall::new("echo");
        assert!(matches!(
            registry.execute(&missing).await,
            Err(AgentError::ToolValidation(_))
        ));

        let wrong_type = ToolCall::new("echo").with_arg("text", "hi").with_arg("times", "lots");
        assert!(matches!(
            registry.execute(&wrong_type).await,
            Err(AgentError::ToolValidation(_))
        ));

        let ok = ToolCall::new("echo").with_arg("text", "hi").with_arg("times", "2");
        assert_eq!(registry.execute(&ok).await.unwrap().output, "hi");
    }

    #[test]
    fn test_parse_multiple_tool_blocks() {
        let content = r#"Let me check.
```tool
{"tool": "search_event_info", "arguments": {"query": "wedding package price"}}
```
and
```tool
{"tool": "get_calendar_events", "arguments": {"days_from_now": 7}}
```"#;

        let calls = parse_tool_calls(content);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "search_event_info");
        assert_eq!(calls[1].arguments["days_from_now"], serde_json::json!(7));
        assert!(calls.iter().all(|c| c.id.is_some()));
    }

    #[test]
    fn test_parse_inline_and_plain_text() {
        let inline = r#"{"tool": "echo", "arguments": {"text": "x"}}"#;
        assert_eq!(parse_tool_calls(inline).len(), 1);

        assert!(parse_tool_calls("Hello! How can I help you today?").is_empty());
    }

    #[test]
    fn test_parameters_json_schema() {
        let schema = EchoTool.schema().parameters_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["times"]["type"], "integer");
        assert_eq!(schema["required"], serde_json::json!(["text"]));
    }
}
