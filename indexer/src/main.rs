use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use docindex_core::persist::IndexPaths;
use docindex_core::tokenizer::DocumentFormat;
use docindex_core::{Index, Indexer, IndexerConfig};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a two-pass TF-IDF index over a document collection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a collection directory
    Build {
        /// Collection root: one level of subdirectories holding the documents
        #[arg(long)]
        collection: String,
        /// Output index directory
        #[arg(long)]
        index: String,
        /// Extension of document files
        #[arg(long, default_value = "html")]
        extension: String,
        /// Treat documents as plain text instead of HTML
        #[arg(long, default_value_t = false)]
        plain_text: bool,
    },
    /// Print statistics of a saved index
    Stats {
        #[arg(long)]
        index: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { collection, index, extension, plain_text } => {
            let config = IndexerConfig {
                extension,
                format: if plain_text { DocumentFormat::PlainText } else { DocumentFormat::Html },
                ..IndexerConfig::new(collection, index)
            };
            build_index(&config)
        }
        Commands::Stats { index } => print_stats(&index),
    }
}

fn build_index(config: &IndexerConfig) -> Result<()> {
    let summary = Indexer::from_config(config).run()?;
    for skipped in &summary.first_pass.skipped {
        eprintln!("skipped {}: {}", skipped.name, skipped.error);
    }
    println!("Index statistics:");
    println!("{}", summary.statistics);
    tracing::info!(index = %config.index.display(), "index build complete");
    Ok(())
}

fn print_stats(index: &str) -> Result<()> {
    if !IndexPaths::new(index).exists() {
        bail!("no index found at {index}");
    }
    let ind = Index::load(index)?;
    println!("Index statistics:");
    println!("{}", ind.statistics());
    Ok(())
}
