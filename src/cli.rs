use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::embedding::EmbedderKind;

#[derive(Debug, Parser)]
#[command(
    name = "vecsearch",
    about = "Perform a vector-based document search",
    after_help = "Thanks for using!"
)]
pub struct Cli {
    /// Embedding backend used to index and query documents
    #[arg(long, global = true, value_enum, default_value_t = EmbedderKind::Colbert)]
    pub embedder: EmbedderKind,

    /// Override the ColBERT model ID or local model path
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rebuild the vector database from a JSON-lines file
    Index(IndexArgs),
    /// Search the vector database
    Search(SearchArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Index --

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// Path for the vectorized database
    pub vecpath: PathBuf,

    /// Path to the JSON-lines data file
    #[arg(short = 'd', long)]
    pub datapath: PathBuf,

    /// Maximum number of documents to process
    #[arg(long, default_value = "10")]
    pub maxdocs: usize,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Path for the vectorized database
    pub vecpath: PathBuf,

    /// Desired search query string
    #[arg(short = 'q', long)]
    pub query: String,

    /// Number of most relevant terms within a result document to display
    #[arg(long, default_value = "5")]
    pub numterms: usize,

    /// Maximum number of result documents to display
    #[arg(long, default_value = "10")]
    pub maxdocs: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "vecsearch",
            &mut std::io::stdout(),
        );
    }
}
