// Embeddings module
// Chunking plus the provider adapters that turn text into vectors


pub mod azure;
pub mod chunking;
pub mod http;
pub mod ollama;

use std::sync::Arc;

use crate::config::{Config, ProviderKind};
use crate::{RagError, Result};

pub use azure::AzureOpenAiClient;
pub use chunking::{Chunk, ChunkingConfig, chunk_documents, chunk_text};
pub use ollama::OllamaClient;

/// Boundary to a service that maps text to fixed-dimension vectors
///
/// Implementations own any retry or timeout policy. Callers treat each call
/// as a single operation that either yields vectors or fails with
/// [`RagError::EmbeddingProvider`].
pub trait EmbeddingProvider: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts; the output has one vector per input, in input order
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Box<P> {
    #[inline]
    fn name(&self) -> &str {
        (**self).name()
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Arc<P> {
    #[inline]
    fn name(&self) -> &str {
        (**self).name()
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}

/// Build the adapter selected by `embedding.provider`
#[inline]
pub fn provider_from_config(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.embedding.provider {
        ProviderKind::Ollama => Arc::new(OllamaClient::new(config)?),
        ProviderKind::Azure => Arc::new(AzureOpenAiClient::new(config)?),
    };
    Ok(provider)
}

/// Check a provider response against the request and the pinned dimension
pub(crate) fn check_response(
    expected_count: usize,
    embeddings: &[Vec<f32>],
    expected_dimension: Option<usize>,
) -> Result<()> {
    if embeddings.len() != expected_count {
        return Err(RagError::EmbeddingProvider(format!(
            "Mismatch between request and response counts: {} vs {}",
            expected_count,
            embeddings.len()
        )));
    }

    for embedding in embeddings {
        if embedding.is_empty() {
            return Err(RagError::EmbeddingProvider(
                "Provider returned an empty embedding".to_string(),
            ));
        }
        match expected_dimension {
            Some(expected) if embedding.len() != expected => {
                return Err(RagError::EmbeddingProvider(format!(
                    "Provider returned {} dimensions, configured for {}",
                    embedding.len(),
                    expected
                )));
            }
            _ => {}
        }
    }

    Ok(())
}
