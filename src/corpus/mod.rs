
pub mod documents;

use crate::index::{Neighbor, VectorIndex};
use crate::store::ChunkStore;
use crate::{RagError, Result};

pub use documents::{Document, load_documents};

/// A vector index and the chunk texts it was built from
///
/// Row `i` of the index always describes chunk `i` of the store. Both halves
/// are private so the only way to grow a corpus is [`Corpus::push`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    index: VectorIndex,
    store: ChunkStore,
}

impl Corpus {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            index: VectorIndex::with_dimension(dimension),
            store: ChunkStore::new(),
        }
    }

    /// Pair an index with its chunk texts, refusing misaligned halves
    #[inline]
    pub fn from_parts(index: VectorIndex, store: ChunkStore) -> Result<Self> {
        if index.len() != store.len() {
            return Err(RagError::CorpusLoad(format!(
                "vector index holds {} rows but chunk store holds {} chunks",
                index.len(),
                store.len()
            )));
        }
        Ok(Self { index, store })
    }

    /// Add one chunk and its embedding, returning the shared row id
    ///
    /// The vector is checked before either half is touched.
    #[inline]
    pub fn push(&mut self, text: impl Into<String>, vector: &[f32]) -> Result<usize> {
        self.index.check_dimension(vector)?;
        let row_id = self.index.add(vector)?;
        let store_row = self.store.append(text);
        debug_assert_eq!(row_id, store_row);
        Ok(row_id)
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[inline]
    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.index.dimension()
    }

    /// Nearest chunks to `query` along with their texts
    #[inline]
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(Neighbor, &str)>> {
        self.index
            .search(query, k)?
            .into_iter()
            .map(|neighbor| Ok((neighbor, self.store.get(neighbor.row_id)?)))
            .collect()
    }

    #[inline]
    pub fn into_parts(self) -> (VectorIndex, ChunkStore) {
        (self.index, self.store)
    }
}
