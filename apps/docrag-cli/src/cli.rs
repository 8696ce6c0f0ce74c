use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docrag")]
#[command(about = "Index a folder of documents and retrieve grounded context for questions", long_about = None)]
pub struct Cli {
    #[arg(long, global = true, help = "Configuration environment (overrides RUST_ENV)")]
    pub env: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Rebuild the index from the source directory")]
    Build {
        #[arg(long, help = "Source directory (overrides index.source_directory)")]
        source: Option<PathBuf>,

        #[arg(long, help = "Index directory (overrides index.persist_directory)")]
        persist: Option<PathBuf>,

        #[arg(long, help = "Index at most this many documents")]
        limit: Option<usize>,
    },

    #[command(about = "Retrieve the chunks closest to a question")]
    Query {
        #[arg(help = "The question to look up")]
        question: String,

        #[arg(short, long, help = "Number of chunks to return (overrides retrieval.k)")]
        k: Option<usize>,

        #[arg(long, help = "Print the grounding prompt for answer synthesis")]
        prompt: bool,
    },

    #[command(about = "Show the persisted index manifest")]
    Status,
}
