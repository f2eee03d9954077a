//! Text Chunking
//!
//! Character-window chunks with overlap. `text_splitter` picks the coarsest
//! semantic break (paragraph, line, sentence, word) that fits the window.

use text_splitter::{Characters, TextSplitter};

use crate::error::{ConciergeError, Result};

/// Window size and overlap, in characters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self { chunk_size, overlap };
        config.splitter()?;
        Ok(config)
    }

    fn splitter(&self) -> Result<TextSplitter<Characters>> {
        if self.chunk_size == 0 {
            return Err(ConciergeError::Config("chunk size must be positive".into()));
        }
        let config = text_splitter::ChunkConfig::new(self.chunk_size)
            .with_overlap(self.overlap)
            .map_err(|e| ConciergeError::Config(format!("invalid chunk overlap: {e}")))?;
        Ok(TextSplitter::new(config))
    }
}

/// Split `text` into overlapping, trimmed chunks. Blank chunks are dropped.
pub fn split_text(text: &str, config: &ChunkConfig) -> Result<Vec<String>> {
    let splitter = config.splitter()?;
    Ok(splitter
        .chunks(text)
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(String::from)
        .collect())
}
