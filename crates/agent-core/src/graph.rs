//! Agent Graph
//!
//! Single-pass orchestration of one conversational turn:
//!
//! ```text
//!            ┌──────────── tool_calls empty ────────────┐
//!            │                                          ▼
//!   ┌─────────────┐  tool_calls non-empty  ┌───────┐  ┌───────────┐
//!   │    agent    │───────────────────────▶│ tools │─▶│ responder │─▶ generation
//!   └─────────────┘                        └───────┘  └───────────┘
//! ```
//!
//! `agent` asks the model which tools to call, `tools` runs them (failures
//! become text), `responder` synthesizes the reply and the lead form. There
//! are no cycles: tool results are never fed back into a second decision.
//!
//! Each step is a public method taking an [`AgentState`], so it can be driven
//! directly from fixtures.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::error::{AgentError, Result};
use crate::message::Turn;
use crate::provider::{GenerationOptions, LlmProvider};
use crate::synthesis::{self, Generation};
use crate::tool::{ToolCall, ToolRegistry};

/// Graph configuration
#[derive(Clone, Debug)]
pub struct GraphConfig {
    /// System instruction for the decision step
    pub decision_prompt: String,

    /// Persona for the synthesis step; the extraction contract is appended
    pub synthesis_prompt: String,

    /// Generation options for tool selection
    pub decision: GenerationOptions,

    /// Generation options for the final answer
    pub synthesis: GenerationOptions,

    /// Upper bound for each model call
    pub model_timeout: Duration,

    /// Upper bound for each tool call
    pub tool_timeout: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            decision_prompt: DEFAULT_DECISION_PROMPT.into(),
            synthesis_prompt: DEFAULT_SYNTHESIS_PROMPT.into(),
            decision: GenerationOptions::default().with_temperature(0.0),
            synthesis: GenerationOptions::default().with_temperature(0.1),
            model_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(20),
        }
    }
}

impl GraphConfig {
    /// Use the same model for both steps
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.decision.model.clone_from(&model);
        self.synthesis.model = model;
        self
    }
}

const DEFAULT_DECISION_PROMPT: &str = "You are a helpful virtual assistant. Respond to user questions \
in a friendly and helpful manner. You can use the available tools to get information.";

const DEFAULT_SYNTHESIS_PROMPT: &str = r"You are a helpful virtual assistant. Your goal is twofold:
1.  **Converse politely**: Answer the user's question based on the history and the output of the tools.
2.  **Extract data**: Fill out a form with the information provided by the user.";

/// Graph nodes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node {
    /// Decision step (entry point)
    Agent,
    /// Tool execution step
    Tools,
    /// Response synthesis step (terminal)
    Responder,
}

/// Outcome of the conditional edge after `agent`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    InvokeTools,
    SynthesizeDirectly,
}

impl Route {
    pub fn target(self) -> Node {
        match self {
            Route::InvokeTools => Node::Tools,
            Route::SynthesizeDirectly => Node::Responder,
        }
    }
}

/// Context threaded through one graph invocation
#[derive(Clone, Debug)]
pub struct AgentState {
    /// Current user input
    pub question: String,

    /// Turns before this invocation
    pub chat_history: Vec<Turn>,

    /// Calls requested by the decision step
    pub tool_calls: Vec<ToolCall>,

    /// Tool name to result or error text; `None` until tools ran
    pub tool_output: Option<BTreeMap<String, String>>,

    generation: Option<Generation>,
}

impl AgentState {
    /// Create the initial state; the question must not be blank
    pub fn new(question: impl Into<String>, chat_history: Vec<Turn>) -> Result<Self> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(AgentError::InvalidInput("message must not be empty".into()));
        }

        Ok(Self {
            question,
            chat_history,
            tool_calls: Vec::new(),
            tool_output: None,
            generation: None,
        })
    }

    /// The final output, once the responder ran
    pub fn generation(&self) -> Option<&Generation> {
        self.generation.as_ref()
    }

    pub fn into_generation(self) -> Option<Generation> {
        self.generation
    }

    fn finish(&mut self, generation: Generation) {
        debug_assert!(self.generation.is_none(), "generation set twice");
        self.generation = Some(generation);
    }
}

/// Result of a full invocation, with the visited path
#[derive(Clone, Debug)]
pub struct GraphRun {
    pub state: AgentState,
    pub path: Vec<Node>,
}

/// The agent graph
pub struct AgentGraph {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: GraphConfig,
}

impl AgentGraph {
    /// Create a new graph over shared, read-only services
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, config: GraphConfig) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, GraphConfig::default())
    }

    /// Answer one question given prior history
    pub async fn invoke(&self, question: &str, chat_history: Vec<Turn>) -> Result<Generation> {
        let state = AgentState::new(question, chat_history)?;
        let run = self.run(state).await?;
        run.state
            .into_generation()
            .ok_or_else(|| AgentError::Other("graph finished without a generation".into()))
    }

    /// Drive the state machine from `agent` to `responder`
    pub async fn run(&self, mut state: AgentState) -> Result<GraphRun> {
        let mut path = Vec::with_capacity(3);
        let mut node = Node::Agent;

        loop {
            tracing::debug!(node = ?node, "Entering graph node");
            path.push(node);

            node = match node {
                Node::Agent => {
                    self.decide(&mut state).await?;
                    Self::route(&state).target()
                }
                Node::Tools => {
                    self.run_tools(&mut state).await;
                    Node::Responder
                }
                Node::Responder => {
                    self.respond(&mut state).await?;
                    break;
                }
            };
        }

        Ok(GraphRun { state, path })
    }

    /// Decision step: ask the model for tool calls
    pub async fn decide(&self, state: &mut AgentState) -> Result<()> {
        let mut turns = Vec::with_capacity(state.chat_history.len() + 2);
        turns.push(Turn::system(self.config.decision_prompt.clone()));
        turns.extend_from_slice(&state.chat_history);
        turns.push(Turn::user(state.question.clone()));

        let schemas = self.tools.schemas();
        let calls = self
            .with_model_timeout(self.provider.decide(&turns, &schemas, &self.config.decision))
            .await?;

        tracing::debug!(
            requested = ?calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "Decision step finished"
        );
        state.tool_calls = calls;
        Ok(())
    }

    /// Conditional edge after `agent`
    pub fn route(state: &AgentState) -> Route {
        if state.tool_calls.is_empty() {
            tracing::debug!("No tools needed, routing to responder");
            Route::SynthesizeDirectly
        } else {
            tracing::debug!(count = state.tool_calls.len(), "Tools needed, routing to tools");
            Route::InvokeTools
        }
    }

    /// Tool execution step. Never fails; every call yields one entry.
    ///
    /// Calls run concurrently. Results are merged in request order so a
    /// repeated tool name gets a stable `name (2)`, `name (3)` key.
    pub async fn run_tools(&self, state: &mut AgentState) {
        let results = join_all(state.tool_calls.iter().map(|call| self.run_tool(call))).await;

        let mut output = BTreeMap::new();
        for (call, text) in state.tool_calls.iter().zip(results) {
            output.insert(unique_key(&output, &call.name), text);
        }

        state.tool_output = Some(output);
    }

    async fn run_tool(&self, call: &ToolCall) -> String {
        tracing::debug!(tool = %call.name, id = ?call.id, args = ?call.arguments, "Executing tool");

        let outcome = match tokio::time::timeout(self.config.tool_timeout, self.tools.execute(call)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AgentError::ToolUnavailable(format!(
                "no answer within {}s",
                self.config.tool_timeout.as_secs()
            ))),
        };

        match outcome {
            Ok(result) if result.success => result.output,
            Ok(result) => {
                tracing::warn!(tool = %call.name, error = %result.output, "Tool reported failure");
                format!("Error executing tool {}: {}", call.name, result.output)
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                format!("Error executing tool {}: {e}", call.name)
            }
        }
    }

    /// Response synthesis step: always sets the generation unless the model
    /// itself is unreachable
    pub async fn respond(&self, state: &mut AgentState) -> Result<()> {
        let turns = synthesis::build_prompt(
            &self.config.synthesis_prompt,
            &state.chat_history,
            &state.question,
            state.tool_output.as_ref(),
        );

        let completion = self
            .with_model_timeout(self.provider.complete(&turns, &self.config.synthesis))
            .await?;

        tracing::debug!(raw = %completion.content, "Synthesis answer received");
        state.finish(synthesis::parse_generation(&completion.content));
        Ok(())
    }

    /// Bound a model call and normalize every failure to `ModelUnavailable`
    async fn with_model_timeout<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.model_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e @ AgentError::ModelUnavailable(_))) => Err(e),
            Ok(Err(e)) => Err(AgentError::ModelUnavailable(e.to_string())),
            Err(_) => Err(AgentError::ModelUnavailable(format!(
                "{} did not answer within {}s",
                self.provider.name(),
                self.config.model_timeout.as_secs()
            ))),
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get the model provider
    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Get configuration
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }
}

fn unique_key(output: &BTreeMap<String, String>, name: &str) -> String {
    if !output.contains_key(name) {
        return name.to_string();
    }
    (2..)
        .map(|n| format!("{name} ({n})"))
        .find(|key| !output.contains_key(key))
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::provider::{Completion, ModelInfo};
    use crate::tool::{ParameterSchema, Tool, ToolResult, ToolSchema};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider answering from fixed scripts and counting calls
    pub(crate) struct ScriptedProvider {
        decisions: Mutex<VecDeque<Result<Vec<ToolCall>>>>,
        completions: Mutex<VecDeque<Result<String>>>,
        pub(crate) prompts: Mutex<Vec<Vec<Turn>>>,
        pub(crate) decide_calls: AtomicUsize,
    }

    impl ScriptedProvider {
        pub(crate) fn new(decision: Vec<ToolCall>, completion: &str) -> Self {
            Self::scripted(vec![Ok(decision)], vec![Ok(completion.to_string())])
        }

        pub(crate) fn scripted(decisions: Vec<Result<Vec<ToolCall>>>, completions: Vec<Result<String>>) -> Self {
            Self {
                decisions: Mutex::new(decisions.into()),
                completions: Mutex::new(completions.into()),
                prompts: Mutex::new(Vec::new()),
                decide_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(&self, turns: &[Turn], options: &GenerationOptions) -> Result<Completion> {
            self.prompts.lock().unwrap().push(turns.to_vec());
            let next = self.completions.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(AgentError::Other("script exhausted".into())))
                .map(|text| Completion::text(text, options.model.clone()))
        }

        async fn decide(
            &self,
            _turns: &[Turn],
            _tools: &[ToolSchema],
            _options: &GenerationOptions,
        ) -> Result<Vec<ToolCall>> {
            self.decide_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.decisions.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    /// Tool returning a canned answer, or failing when asked to
    pub(crate) struct FakeTool {
        pub(crate) name: &'static str,
        pub(crate) answer: &'static str,
        pub(crate) delay: Duration,
    }

    #[async_trait]
    impl Tool for FakeTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: self.name.into(),
                description: format!("Fake {}", self.name),
                parameters: vec![ParameterSchema {
                    name: "query".into(),
                    param_type: "string".into(),
                    description: "Query".into(),
                    required: false,
                    default: None,
                    enum_values: None,
                }],
            }
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            tokio::time::sleep(self.delay).await;
            match call.arguments.get("query").and_then(|v| v.as_str()) {
                Some("fail") => Err(AgentError::ToolExecution("backend exploded".into())),
                _ => Ok(ToolResult::success(self.name, self.answer)),
            }
        }
    }

    pub(crate) fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register(FakeTool { name: "search_event_info", answer: "Wedding packages start at $5,000.", delay: Duration::ZERO })
            .unwrap();
        registry
            .register(FakeTool { name: "get_calendar_events", answer: "No events found in the next 7 days.", delay: Duration::ZERO })
            .unwrap();
        Arc::new(registry)
    }

    const REPLY_JSON: &str = r#"{"reply": "Our wedding packages start at $5,000.", "formData": {}}"#;

    #[tokio::test]
    async fn test_no_tool_calls_skips_tools_node() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new(), REPLY_JSON));
        let graph = AgentGraph::with_defaults(provider.clone(), registry());

        let run = graph.run(AgentState::new("Hello!", Vec::new()).unwrap()).await.unwrap();

        assert_eq!(run.path, vec![Node::Agent, Node::Responder]);
        assert!(run.state.tool_output.is_none());
        assert_eq!(run.state.generation().unwrap().reply, "Our wedding packages start at $5,000.");

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].iter().any(|t| t.content() == synthesis::NO_TOOLS_NOTICE));
    }

    #[tokio::test]
    async fn test_tool_calls_visit_tools_once() {
        let calls = vec![
            ToolCall::new("search_event_info").with_arg("query", "wedding package price"),
            ToolCall::new("get_calendar_events").with_arg("query", "week"),
        ];
        let provider = Arc::new(ScriptedProvider::new(calls, REPLY_JSON));
        let graph = AgentGraph::with_defaults(provider.clone(), registry());

        let run = graph
            .run(AgentState::new("What's the price of a wedding package?", Vec::new()).unwrap())
            .await
            .unwrap();

        assert_eq!(run.path, vec![Node::Agent, Node::Tools, Node::Responder]);
        assert_eq!(provider.decide_calls.load(Ordering::SeqCst), 1);

        let output = run.state.tool_output.as_ref().unwrap();
        assert_eq!(output.len(), 2);
        assert_eq!(output["search_event_info"], "Wedding packages start at $5,000.");

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].iter().any(|t| t.content().contains("- search_event_info: Wedding packages")));
    }

    #[tokio::test]
    async fn test_unknown_and_failing_tools_do_not_abort_batch() {
        let calls = vec![
            ToolCall::new("book_venue"),
            ToolCall::new("search_event_info").with_arg("query", "fail"),
            ToolCall::new("get_calendar_events"),
        ];
        let provider = Arc::new(ScriptedProvider::new(Vec::new(), REPLY_JSON));
        let graph = AgentGraph::with_defaults(provider, registry());
        let mut state = AgentState::new("Book me", Vec::new()).unwrap();
        state.tool_calls = calls;

        graph.run_tools(&mut state).await;

        let output = state.tool_output.unwrap();
        assert_eq!(output.len(), 3);
        assert!(output["book_venue"].starts_with("Error executing tool book_venue"));
        assert!(output["search_event_info"].contains("backend exploded"));
        assert_eq!(output["get_calendar_events"], "No events found in the next 7 days.");
    }

    #[tokio::test]
    async fn test_repeated_tool_names_keep_one_entry_per_call() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new(), REPLY_JSON));
        let graph = AgentGraph::with_defaults(provider, registry());
        let mut state = AgentState::new("Prices", Vec::new()).unwrap();
        state.tool_calls = vec![
            ToolCall::new("search_event_info").with_arg("query", "weddings"),
            ToolCall::new("search_event_info").with_arg("query", "fail"),
        ];

        graph.run_tools(&mut state).await;

        let output = state.tool_output.unwrap();
        assert_eq!(output.len(), 2);
        assert_eq!(output["search_event_info"], "Wedding packages start at $5,000.");
        assert!(output["search_event_info (2)"].contains("backend exploded"));
    }

    #[tokio::test]
    async fn test_slow_tool_times_out_as_text() {
        let mut registry = ToolRegistry::new();
        registry
            .register(FakeTool { name: "slow", answer: "late", delay: Duration::from_secs(5) })
            .unwrap();
        let config = GraphConfig {
            tool_timeout: Duration::from_millis(20),
            ..GraphConfig::default()
        };
        let provider = Arc::new(ScriptedProvider::new(Vec::new(), REPLY_JSON));
        let graph = AgentGraph::new(provider, Arc::new(registry), config);
        let mut state = AgentState::new("?", Vec::new()).unwrap();
        state.tool_calls = vec![ToolCall::new("slow")];

        graph.run_tools(&mut state).await;

        assert!(state.tool_output.unwrap()["slow"].contains("Tool unavailable"));
    }

    #[tokio::test]
    async fn test_model_failure_is_fatal() {
        let provider = Arc::new(ScriptedProvider::scripted(
            vec![Err(AgentError::Other("connection refused".into()))],
            Vec::new(),
        ));
        let graph = AgentGraph::with_defaults(provider, registry());

        let err = graph.invoke("Hello", Vec::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::ModelUnavailable(msg) if msg.contains("connection refused")));

        let provider = Arc::new(ScriptedProvider::scripted(
            vec![Ok(Vec::new())],
            vec![Err(AgentError::ModelUnavailable("503".into()))],
        ));
        let graph = AgentGraph::with_defaults(provider, registry());
        assert!(matches!(
            graph.invoke("Hello", Vec::new()).await,
            Err(AgentError::ModelUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_synthesis_falls_back() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new(), "Hello there, how can I help?"));
        let graph = AgentGraph::with_defaults(provider, registry());

        let generation = graph.invoke("Hi", Vec::new()).await.unwrap();
        assert_eq!(generation.reply, "Hello there, how can I help?");
        assert!(generation.form_data.is_empty());
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new(), REPLY_JSON));
        let graph = AgentGraph::with_defaults(provider.clone(), registry());

        assert!(matches!(graph.invoke("  ", Vec::new()).await, Err(AgentError::InvalidInput(_))));
        assert_eq!(provider.decide_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_route_is_pure() {
        let mut state = AgentState::new("q", Vec::new()).unwrap();
        assert_eq!(AgentGraph::route(&state), Route::SynthesizeDirectly);
        state.tool_calls.push(ToolCall::new("search_event_info"));
        assert_eq!(AgentGraph::route(&state), Route::InvokeTools);
        assert_eq!(Route::InvokeTools.target(), Node::Tools);
    }
}
