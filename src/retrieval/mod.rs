// Retrieval module
// Serves queries against a loaded corpus: embed, search, look up, join

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::corpus::Corpus;
use crate::embeddings::EmbeddingProvider;
use crate::persistence::{self, CorpusPaths};
use crate::{RagError, Result};

/// Number of chunks retrieved when the caller does not say otherwise
pub const DEFAULT_TOP_K: usize = 3;
/// Placed between chunk texts in an assembled context
pub const DEFAULT_SEPARATOR: &str = "\n\n";

/// One retrieved chunk with its squared L2 distance to the query
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub row_id: usize,
    pub distance: f32,
    pub text: String,
}

/// Query-time entry point over a read-only corpus
///
/// The corpus is shared behind an [`Arc`] and never mutated, so one service
/// can answer concurrent queries when its provider is `Send + Sync`.
#[derive(Debug)]
pub struct RetrievalService<P> {
    corpus: Arc<Corpus>,
    provider: P,
    separator: String,
}

impl<P: EmbeddingProvider> RetrievalService<P> {
    #[inline]
    pub fn new(corpus: Arc<Corpus>, provider: P) -> Self {
        Self {
            corpus,
            provider,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }

    /// Load the corpus files and serve them
    ///
    /// A corpus that fails to load is returned as [`RagError::CorpusLoad`] and
    /// no service is constructed.
    #[inline]
    pub fn open(paths: &CorpusPaths, provider: P) -> Result<Self> {
        let corpus = persistence::load(paths)?;
        Ok(Self::new(Arc::new(corpus), provider))
    }

    #[inline]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    #[inline]
    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    #[inline]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Return the `k` chunks nearest to `query`, joined into one context string
    ///
    /// The context is empty only when the search finds nothing, which happens
    /// for an empty corpus or `k == 0`. Any failure while serving the query
    /// is wrapped in [`RagError::Retrieval`].
    #[inline]
    pub fn retrieve(&self, query: &str, k: usize) -> Result<String> {
        let chunks = self.retrieve_chunks(query, k)?;
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        Ok(texts.join(&self.separator))
    }

    /// Like [`retrieve`](Self::retrieve) but keeps row ids and distances
    #[inline]
    pub fn retrieve_chunks(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        self.search(query, k).map_err(|e| {
            warn!("Retrieval failed for query of {} chars: {}", query.len(), e);
            RagError::retrieval(e)
        })
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 || self.corpus.is_empty() {
            debug!("Nothing to search (k = {}, corpus size {})", k, self.corpus.len());
            return Ok(Vec::new());
        }

        let vector = self.provider.embed(query)?;
        let hits = self.corpus.nearest(&vector, k)?;
        debug!(
            "Query matched {} chunks using {}",
            hits.len(),
            self.provider.name()
        );

        Ok(hits
            .into_iter()
            .map(|(neighbor, text)| RetrievedChunk {
                row_id: neighbor.row_id,
                distance: neighbor.distance,
                text: text.to_string(),
            })
            .collect())
    }
}
