//! rxivec — bulk preprint-XML → metadata, embeddings, and vector-DB load files.
//! Entry point for the pipeline binary.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rxivec_cli::config::Config;
use rxivec_cli::pipeline;
use rxivec_embed::SentenceEmbedder;

#[derive(Parser)]
#[command(
    name = "rxivec",
    version,
    about = "Turn a bioRxiv/medRxiv XML dump into Parquet tables for a vector database"
)]
struct Cli {
    /// Path to rxivec.toml (default: ./rxivec.toml or $RXIVEC_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract article metadata into a Parquet table
    Metadata {
        /// Directory of JATS XML article files
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output Parquet file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Extraction worker count (1 = sequential)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Embed article abstracts into a Parquet table of vectors
    Embed {
        /// Directory of JATS XML article files
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output Parquet file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Extraction worker count (1 = sequential)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Inner-join embeddings and metadata into the vector-DB load file
    Merge {
        /// Embeddings Parquet file
        #[arg(long)]
        embeddings: Option<PathBuf>,
        /// Metadata Parquet file
        #[arg(long)]
        metadata: Option<PathBuf>,
        /// Output Parquet file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Metadata { input, output, workers } => {
            let input = input.unwrap_or_else(|| config.data_dir());
            let output = output.unwrap_or_else(|| config.metadata_path());
            let error_log = config.metadata_error_log_path();
            let workers = workers.unwrap_or(config.pipeline.workers);

            pipeline::run_metadata(&input, &output, &error_log, workers).await?;
        }
        Command::Embed { input, output, workers } => {
            let input = input.unwrap_or_else(|| config.data_dir());
            let output = output.unwrap_or_else(|| config.embeddings_path());
            let error_log = config.embed_error_log_path();
            let workers = workers.unwrap_or(config.pipeline.workers);

            let embedder = SentenceEmbedder::new(config.embedding.to_embedder_config()).await?;
            info!(model = embedder.model_name(), gpu = embedder.is_gpu(), "Embedder ready");

            pipeline::run_embed(&input, &output, &error_log, workers, &embedder).await?;
        }
        Command::Merge { embeddings, metadata, output } => {
            let embeddings = embeddings.unwrap_or_else(|| config.embeddings_path());
            let metadata = metadata.unwrap_or_else(|| config.metadata_path());
            let output = output.unwrap_or_else(|| config.merged_path());

            rxivec_store::merge_files(&embeddings, &metadata, &output)?;
        }
    }

    Ok(())
}
