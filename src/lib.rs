use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Row {row_id} is out of range (store holds {len} chunks)")]
    OutOfRange { row_id: usize, len: usize },

    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("Corpus load error: {0}")]
    CorpusLoad(String),

    #[error("Retrieval error: {source}")]
    Retrieval { source: Box<RagError> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Wrap a failure that happened while serving a single query
    #[inline]
    pub fn retrieval(source: Self) -> Self {
        Self::Retrieval {
            source: Box::new(source),
        }
    }

    #[inline]
    pub fn is_retrieval_failure(&self) -> bool {
        matches!(self, Self::Retrieval { .. })
    }
}

pub mod commands;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod index;
pub mod indexer;
pub mod persistence;
pub mod retrieval;
pub mod store;
