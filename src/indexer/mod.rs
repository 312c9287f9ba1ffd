// Indexer module
// Turns a directory of documents into a saved corpus: chunk, embed, append, persist


use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::corpus::{Corpus, Document, load_documents};
use crate::embeddings::chunking::chunk_documents;
use crate::embeddings::{EmbeddingProvider, check_response};
use crate::persistence::{self, CorpusPaths};
use crate::{RagError, Result};

const DEFAULT_BATCH_SIZE: usize = 16;
const DEFAULT_CONCURRENCY: usize = 4;

/// Chunk texts of one batch with their embeddings, in input order
type EmbeddedBatch = (Vec<String>, Vec<Vec<f32>>);

/// Build pipeline from raw documents to an aligned [`Corpus`]
pub struct CorpusBuilder<P: ?Sized> {
    provider: Arc<P>,
    chunk_size: NonZeroUsize,
    batch_size: usize,
    concurrency: usize,
    dimension: Option<usize>,
}

/// Statistics about a finished build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStats {
    pub documents: usize,
    pub chunks: usize,
    pub batches: usize,
    pub dimension: usize,
    pub duration: Duration,
}

impl<P> CorpusBuilder<P>
where
    P: EmbeddingProvider + ?Sized + 'static,
{
    #[inline]
    pub fn new(provider: Arc<P>, chunk_size: NonZeroUsize) -> Self {
        Self {
            provider,
            chunk_size,
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            dimension: None,
        }
    }

    /// Take chunking, batching, concurrency and the pinned dimension from `config`
    #[inline]
    pub fn from_config(config: &Config, provider: Arc<P>) -> Result<Self> {
        let chunk_size = config.chunking.size()?;
        Ok(Self::new(provider, chunk_size)
            .with_batch_size(config.embedding.batch_size as usize)
            .with_concurrency(config.embedding.concurrency)
            .with_dimension(config.embedding.expected_dimension()))
    }

    #[inline]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Number of embedding batches in flight at once; 1 is sequential
    #[inline]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[inline]
    pub fn with_dimension(mut self, dimension: Option<usize>) -> Self {
        self.dimension = dimension;
        self
    }

    /// Load `dir` and build a corpus from its documents
    #[inline]
    pub async fn build_from_dir(&self, dir: &Path) -> Result<(Corpus, BuildStats)> {
        let documents = load_documents(dir)?;
        if documents.is_empty() {
            return Err(anyhow!("No .txt documents found in {}", dir.display()).into());
        }
        self.build(&documents).await
    }

    /// Build from `dir` and save to `paths`; nothing is written if any step fails
    #[inline]
    pub async fn build_and_save(&self, dir: &Path, paths: &CorpusPaths) -> Result<BuildStats> {
        let (corpus, stats) = self.build_from_dir(dir).await?;
        persistence::save(&corpus, paths)?;
        Ok(stats)
    }

    /// Chunk `documents`, embed every chunk and append them in creation order
    ///
    /// Batches are embedded concurrently on the blocking pool but consumed
    /// in submission order, so row `i` is always chunk `i`.
    #[inline]
    pub async fn build(&self, documents: &[Document]) -> Result<(Corpus, BuildStats)> {
        let start = Instant::now();
        let chunks = chunk_documents(
            documents.iter().map(|doc| doc.content.as_str()),
            self.chunk_size,
        );
        if chunks.is_empty() {
            return Err(anyhow!(
                "Documents produced no chunks; nothing to index ({} documents)",
                documents.len()
            )
            .into());
        }

        let total_chunks = chunks.len();
        let batches: Vec<Vec<String>> = chunks
            .chunks(self.batch_size)
            .map(|batch| batch.iter().map(|chunk| chunk.text.clone()).collect())
            .collect();
        let batch_count = batches.len();
        info!(
            "Embedding {} chunks from {} documents in {} batches using {}",
            total_chunks,
            documents.len(),
            batch_count,
            self.provider.name()
        );

        let bar = progress_bar(total_chunks);
        let mut corpus = match self.dimension {
            Some(dimension) => Corpus::with_dimension(dimension),
            None => Corpus::new(),
        };

        let mut embedded = stream::iter(batches.into_iter().map(|batch| {
            let provider = Arc::clone(&self.provider);
            async move {
                let joined = tokio::task::spawn_blocking(move || -> Result<EmbeddedBatch> {
                    let vectors = provider.embed_batch(&batch)?;
                    Ok((batch, vectors))
                })
                .await;
                match joined {
                    Ok(result) => result,
                    Err(e) => Err(RagError::Other(
                        anyhow::Error::new(e).context("Embedding task failed to complete"),
                    )),
                }
            }
        }))
        .buffered(self.concurrency);

        while let Some(result) = embedded.next().await {
            let (batch, vectors) = match result {
                Ok(pair) => pair,
                Err(e) => {
                    bar.abandon();
                    warn!("Build aborted after {} chunks: {}", corpus.len(), e);
                    return Err(e);
                }
            };
            check_response(batch.len(), &vectors, None)?;

            for (text, vector) in batch.into_iter().zip(&vectors) {
                corpus.push(text, vector)?;
            }
            bar.inc(vectors.len() as u64);
            debug!("Corpus holds {} of {} chunks", corpus.len(), total_chunks);
        }
        bar.finish_and_clear();

        let stats = BuildStats {
            documents: documents.len(),
            chunks: corpus.len(),
            batches: batch_count,
            dimension: corpus.dimension().unwrap_or(0),
            duration: start.elapsed(),
        };
        info!(
            "Built corpus of {} chunks (dimension {}) in {:.2}s",
            stats.chunks,
            stats.dimension,
            stats.duration.as_secs_f64()
        );
        Ok((corpus, stats))
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding chunks {wide_bar}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(len as u64).with_style(style)
}
