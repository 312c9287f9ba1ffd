
use crate::{RagError, Result};

/// Append-only chunk texts addressed by row id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkStore {
    chunks: Vec<String>,
}

impl ChunkStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return its row id
    #[inline]
    pub fn append(&mut self, text: impl Into<String>) -> usize {
        let row_id = self.chunks.len();
        self.chunks.push(text.into());
        row_id
    }

    #[inline]
    pub fn get(&self, row_id: usize) -> Result<&str> {
        self.chunks
            .get(row_id)
            .map(String::as_str)
            .ok_or(RagError::OutOfRange {
                row_id,
                len: self.chunks.len(),
            })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &str> {
        self.chunks.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ChunkStore {
    #[inline]
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            chunks: iter.into_iter().map(Into::into).collect(),
        }
    }
}
