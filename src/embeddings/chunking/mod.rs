
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;

pub const DEFAULT_CHUNK_SIZE: usize = 800;

/// Represents a chunk of corpus text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of this chunk across the whole corpus, equal to its row id
    pub id: usize,
    /// The chunk text
    pub text: String,
}

/// Configuration for content chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Chunk length in characters
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn size(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.chunk_size).ok_or(ConfigError::InvalidChunkSize(self.chunk_size))
    }
}

/// Split `text` into consecutive pieces of exactly `size` characters.
///
/// The final piece holds the remainder and may be shorter. Concatenating the
/// output always reproduces the input, and an empty input yields no chunks.
#[inline]
pub fn chunk_text(text: &str, size: NonZeroUsize) -> Vec<String> {
    let size = size.get();
    let mut chunks = Vec::with_capacity(text.len() / size + 1);
    let mut current = String::with_capacity(size);
    let mut count = 0;

    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == size {
            chunks.push(std::mem::replace(&mut current, String::with_capacity(size)));
            count = 0;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Chunk a sequence of documents, numbering chunks across all of them
///
/// Ids continue from one document to the next in the order given, so callers
/// control row id assignment through document order.
#[inline]
pub fn chunk_documents<'a, I>(documents: I, size: NonZeroUsize) -> Vec<Chunk>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut chunks = Vec::new();

    for document in documents {
        for text in chunk_text(document, size) {
            chunks.push(Chunk {
                id: chunks.len(),
                text,
            });
        }
    }

    debug!(
        "Chunked documents into {} chunks of up to {} characters",
        chunks.len(),
        size
    );

    chunks
}
