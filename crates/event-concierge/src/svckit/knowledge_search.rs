//! Knowledge Search Tool
//!
//! Looks up services, packages and prices in the company documentation.

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema, tool::ParameterSchema};

use crate::knowledge::KnowledgeIndex;

pub const TOOL_NAME: &str = "search_event_info";

/// Passages returned per query
const TOP_K: usize = 3;

/// Tool for retrieving passages from the knowledge index
pub struct KnowledgeSearchTool {
    index: Arc<dyn KnowledgeIndex>,
    top_k: usize,
}

impl KnowledgeSearchTool {
    pub fn new(index: Arc<dyn KnowledgeIndex>) -> Self {
        Self { index, top_k: TOP_K }
    }
}

#[async_trait]
impl Tool for KnowledgeSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: TOOL_NAME.into(),
            description: "Search the company's information about event services, packages, prices and \
                          policies. Use it for any question about what the company offers."
                .into(),
            parameters: vec![ParameterSchema {
                name: "query".into(),
                param_type: "string".into(),
                description: "What to look for, e.g. 'wedding package price'".into(),
                required: true,
                default: None,
                enum_values: None,
            }],
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let query = call
            .arguments
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .trim();

        let mut passages = self.index.top_k(query, self.top_k).await?;
        passages.truncate(self.top_k);
        tracing::debug!(query, hits = passages.len(), "Knowledge search finished");

        let output = if passages.is_empty() {
            "No relevant information found.".to_string()
        } else {
            format!("Relevant information found:\n{}", passages.join("\n\n"))
        };

        Ok(ToolResult::success(TOOL_NAME, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::knowledge::{ChunkConfig, InMemoryIndex};
    use agent_core::ToolRegistry;

    fn tool() -> KnowledgeSearchTool {
        let index = InMemoryIndex::from_documents(
            &[
                "Wedding package: ceremony, banquet and decoration. Price from $5,000.",
                "Birthday parties include a cake and a DJ.",
            ],
            &ChunkConfig::default(),
        )
        .unwrap();
        KnowledgeSearchTool::new(Arc::new(index))
    }

    /// Returns every passage it holds, whatever `k` is asked for
    struct FixedIndex {
        passages: Vec<String>,
        requested_k: Mutex<Option<usize>>,
    }

    #[async_trait]
    impl KnowledgeIndex for FixedIndex {
        async fn top_k(&self, _query: &str, k: usize) -> crate::error::Result<Vec<String>> {
            *self.requested_k.lock().unwrap() = Some(k);
            Ok(self.passages.clone())
        }

        fn len(&self) -> usize {
            self.passages.len()
        }
    }

    #[tokio::test]
    async fn test_returns_relevant_passages() {
        let call = ToolCall::new(TOOL_NAME).with_arg("query", "wedding price");
        let result = tool().execute(&call).await.unwrap();

        assert!(result.success);
        assert!(result.output.starts_with("Relevant information found:\n"));
        assert!(result.output.contains("Wedding package"));
    }

    #[tokio::test]
    async fn test_at_most_three_passages_joined_by_blank_line() {
        let passages: Vec<String> = (1..=4).map(|i| format!("Package {i}: venue, catering and music.")).collect();
        let index = Arc::new(FixedIndex {
            passages: passages.clone(),
            requested_k: Mutex::new(None),
        });
        let tool = KnowledgeSearchTool::new(index.clone());

        let call = ToolCall::new(TOOL_NAME).with_arg("query", "package");
        let result = tool.execute(&call).await.unwrap();

        assert_eq!(*index.requested_k.lock().unwrap(), Some(3));
        assert_eq!(
            result.output,
            format!(
                "Relevant information found:\n{}\n\n{}\n\n{}",
                passages[0], passages[1], passages[2]
            )
        );
    }

    #[tokio::test]
    async fn test_ranked_index_caps_at_three() {
        let index = InMemoryIndex::from_documents(
            &[
                "Catering menu A for weddings.",
                "Catering menu B for birthdays.",
                "Catering menu C for corporate events.",
                "Catering menu D for graduations.",
            ],
            &ChunkConfig::default(),
        )
        .unwrap();
        let tool = KnowledgeSearchTool::new(Arc::new(index));

        let result = tool
            .execute(&ToolCall::new(TOOL_NAME).with_arg("query", "catering menu"))
            .await
            .unwrap();

        let body = result.output.strip_prefix("Relevant information found:\n").unwrap();
        assert_eq!(body.split("\n\n").count(), 3);
    }

    #[tokio::test]
    async fn test_nothing_found() {
        let call = ToolCall::new(TOOL_NAME).with_arg("query", "submarine rental");
        let result = tool().execute(&call).await.unwrap();
        assert_eq!(result.output, "No relevant information found.");
    }

    #[tokio::test]
    async fn test_query_is_required() {
        let mut registry = ToolRegistry::new();
        registry.register(tool()).unwrap();

        let result = registry.execute(&ToolCall::new(TOOL_NAME)).await;
        assert!(matches!(result, Err(agent_core::AgentError::ToolValidation(_))));
    }
}
