//! Knowledge Base
//!
//! Passage retrieval over the company's service documentation.

mod chunk;
mod memory;

pub use chunk::ChunkConfig;
pub use memory::InMemoryIndex;

use async_trait::async_trait;

use crate::error::Result;

/// Knowledge index trait (Strategy pattern)
///
/// Implement this for an embedding store or vector database. Indexes are
/// built before the server starts and only read afterwards.
#[async_trait]
pub trait KnowledgeIndex: Send + Sync {
    /// The `k` most relevant passages, best first
    async fn top_k(&self, query: &str, k: usize) -> Result<Vec<String>>;

    /// Number of indexed passages
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
