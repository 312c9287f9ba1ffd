use std::path::PathBuf;

use clap::{Parser, Subcommand};
use corpus_rag::commands::{build_corpus, query_corpus, show_status};
use corpus_rag::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "corpus-rag")]
#[command(about = "Build a vector corpus from text documents and retrieve context for queries")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding provider, chunking and corpus files
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk, embed and save every .txt document in the data directory
    Build {
        /// Read documents from this directory instead of the configured one
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Retrieve the chunks nearest to a query
    Query {
        /// Query text
        text: String,
        /// Number of chunks to retrieve (defaults to retrieval.top_k)
        #[arg(short, long)]
        k: Option<usize>,
        /// Print each chunk with its row id and distance
        #[arg(long)]
        scores: bool,
    },
    /// Show corpus files and embedding provider health
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Build { data_dir } => {
            build_corpus(data_dir).await?;
        }
        Commands::Query { text, k, scores } => {
            query_corpus(&text, k, scores)?;
        }
        Commands::Status => {
            show_status()?;
        }
    }

    Ok(())
}
