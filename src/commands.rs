use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::{Config, ProviderKind, load_config};
use crate::embeddings::{EmbeddingProvider, OllamaClient, provider_from_config};
use crate::indexer::{BuildStats, CorpusBuilder};
use crate::persistence;
use crate::retrieval::RetrievalService;

/// Build the corpus from the configured (or given) document directory and save it
#[inline]
pub async fn build_corpus(data_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let data_dir = data_dir.unwrap_or_else(|| config.data_dir());
    let paths = config.corpus_paths();
    info!("Building corpus from {}", data_dir.display());

    let provider = provider_from_config(&config)?;
    let builder = CorpusBuilder::from_config(&config, provider)?;
    let stats = builder.build_and_save(&data_dir, &paths).await?;

    print_build_stats(&stats);
    println!("  Vectors: {}", paths.index.display());
    println!("  Texts: {}", paths.texts.display());
    Ok(())
}

fn print_build_stats(stats: &BuildStats) {
    println!("Corpus built successfully!");
    println!("  Documents: {}", stats.documents);
    println!("  Chunks: {}", stats.chunks);
    println!("  Dimension: {}", stats.dimension);
    println!("  Embedding batches: {}", stats.batches);
    println!("  Duration: {:.2}s", stats.duration.as_secs_f64());
}

/// Answer one query against the saved corpus
///
/// Prints the joined context, or each chunk with its distance when `scores`
/// is set.
#[inline]
pub fn query_corpus(query: &str, k: Option<usize>, scores: bool) -> Result<()> {
    let config = load_config().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let k = k.unwrap_or(config.retrieval.top_k);
    let paths = config.corpus_paths();
    if !paths.exists() {
        bail!(
            "No corpus found at {} and {}. Run 'corpus-rag build' first.",
            paths.index.display(),
            paths.texts.display()
        );
    }

    let provider = provider_from_config(&config)?;
    let service = RetrievalService::open(&paths, provider)?
        .with_separator(config.retrieval.separator.clone());

    if scores {
        let chunks = service.retrieve_chunks(query, k)?;
        if chunks.is_empty() {
            println!("No matching chunks.");
        }
        for (rank, chunk) in chunks.iter().enumerate() {
            println!(
                "#{} row {} (distance {:.4})",
                rank + 1,
                chunk.row_id,
                chunk.distance
            );
            println!("{}", chunk.text);
            println!();
        }
    } else {
        let context = service.retrieve(query, k)?;
        println!("{}", context);
    }
    Ok(())
}

/// Show corpus files, their contents and provider health
#[inline]
pub fn show_status() -> Result<()> {
    let config = load_config().unwrap_or_default();

    println!("📊 Corpus RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("📚 Corpus Status:");
    println!("   Documents: {}", config.data_dir().display());
    let paths = config.corpus_paths();
    if paths.exists() {
        match persistence::load(&paths) {
            Ok(corpus) => {
                println!("   ✅ Loaded: {} chunks", corpus.len());
                match corpus.dimension() {
                    Some(dimension) => println!("   🔢 Dimension: {}", dimension),
                    None => println!("   🔢 Dimension: none (empty corpus)"),
                }
            }
            Err(e) => {
                println!("   ❌ Corpus files are unusable - {}", e);
            }
        }
    } else {
        println!("   💤 Not built yet. Run 'corpus-rag build'.");
    }
    println!("   Vectors: {}", paths.index.display());
    println!("   Texts: {}", paths.texts.display());

    println!();
    println!("🤖 Embedding Provider Status:");
    match config.embedding.provider {
        ProviderKind::Ollama => show_ollama_status(&config),
        ProviderKind::Azure => match provider_from_config(&config) {
            Ok(provider) => {
                println!("   ✅ {}: Configured ({})", provider.name(), config.azure.endpoint);
                println!("   📋 Deployment: {}", config.azure.deployment);
            }
            Err(e) => {
                println!("   ❌ Azure OpenAI: Not usable - {}", e);
            }
        },
    }
    println!("   🔢 Batch Size: {}", config.embedding.batch_size);
    println!("   🚦 Concurrency: {}", config.embedding.concurrency);

    Ok(())
}

fn show_ollama_status(config: &Config) {
    match OllamaClient::new(config) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.embedding.host, config.embedding.port
                );
                println!("   📋 Model: {}", config.embedding.model);
            }
            Err(e) => {
                warn!("Ollama health check failed: {:#}", e);
                println!("   ⚠️  Ollama: Unreachable or unhealthy - {}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Ollama: Invalid configuration - {}", e);
        }
    }
}
