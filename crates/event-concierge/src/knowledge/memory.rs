//! In-Memory Knowledge Index
//!
//! A RAM-backed tantivy index over chunked documents, ranked by BM25.
//! Built once at startup and read-only afterwards.

use std::path::Path;

use async_trait::async_trait;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, STORED, Schema, TEXT, Value};
use tantivy::{Index, IndexReader, IndexWriter, TantivyDocument, doc};

use super::KnowledgeIndex;
use super::chunk::{ChunkConfig, split_text};
use crate::error::{ConciergeError, Result};

const WRITER_MEMORY_BYTES: usize = 15_000_000;

/// Knowledge index held entirely in memory
pub struct InMemoryIndex {
    index: Index,
    body: Field,
    /// `None` until at least one passage is committed
    reader: Option<IndexReader>,
    chunks: usize,
}

impl InMemoryIndex {
    /// Index with no documents
    pub fn empty() -> Self {
        let mut schema = Schema::builder();
        let body = schema.add_text_field("body", TEXT | STORED);

        Self {
            index: Index::create_in_ram(schema.build()),
            body,
            reader: None,
            chunks: 0,
        }
    }

    /// Chunk and index a set of documents
    pub fn from_documents<S: AsRef<str>>(documents: &[S], config: &ChunkConfig) -> Result<Self> {
        let mut passages = Vec::new();
        for document in documents {
            passages.extend(split_text(document.as_ref(), config)?);
        }

        let mut index = Self::empty();
        if passages.is_empty() {
            return Ok(index);
        }

        let mut writer: IndexWriter = index.index.writer_with_num_threads(1, WRITER_MEMORY_BYTES)?;
        for passage in &passages {
            writer.add_document(doc!(index.body => passage.as_str()))?;
        }
        writer.commit()?;

        index.reader = Some(index.index.reader()?);
        index.chunks = passages.len();
        Ok(index)
    }

    /// Load and index a markdown (or plain text) corpus file
    pub fn from_markdown_file(path: impl AsRef<Path>, config: &ChunkConfig) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConciergeError::Knowledge(format!("cannot read knowledge file {}: {e}", path.display()))
        })?;

        let index = Self::from_documents(&[content], config)?;
        tracing::info!(path = %path.display(), chunks = index.len(), "Knowledge index built");
        Ok(index)
    }

    /// Rank passages against a query; passages sharing no term are left out
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<String>> {
        let Some(reader) = &self.reader else {
            return Ok(Vec::new());
        };
        if k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let parser = QueryParser::for_index(&self.index, vec![self.body]);
        let (parsed, errors) = parser.parse_query_lenient(query);
        if !errors.is_empty() {
            tracing::debug!(?errors, "Ignored parts of the knowledge query");
        }

        let searcher = reader.searcher();
        let top_docs = searcher.search(&parsed, &TopDocs::with_limit(k))?;

        let mut passages = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            if score <= 0.0 {
                continue;
            }
            let document: TantivyDocument = searcher.doc(address)?;
            if let Some(text) = document.get_first(self.body).and_then(|v| v.as_str()) {
                passages.push(text.to_string());
            }
        }
        Ok(passages)
    }
}

#[async_trait]
impl KnowledgeIndex for InMemoryIndex {
    async fn top_k(&self, query: &str, k: usize) -> Result<Vec<String>> {
        self.search(query, k)
    }

    fn len(&self) -> usize {
        self.chunks
    }
}
