//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "textsim",
    version,
    author = "neur0map",
    about = "Lexical similarity search over a categorized text corpus",
    long_about = "textsim keeps a corpus of short categorized texts in memory, builds a TF-IDF \
                  similarity index over it on demand, and answers top-N similarity queries \
                  either in-process or through a local daemon."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/textsim/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the search daemon in the foreground
    Serve {
        /// Corpus file to load before accepting requests
        #[arg(long, value_name = "FILE")]
        corpus: Option<PathBuf>,
    },

    /// Build the similarity index on the running daemon
    Init,

    /// Find the corpus texts most similar to a query
    Search {
        /// Query text
        query: String,

        /// Number of results to return
        #[arg(short = 'n', long = "top-n", allow_negative_numbers = true)]
        top_n: Option<i64>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,

        /// Search this corpus file in-process instead of asking the daemon
        #[arg(long, value_name = "FILE")]
        corpus: Option<PathBuf>,
    },

    /// Append a corpus file to the running daemon
    Load {
        /// JSON array or JSON Lines file of {"text", "category"} records
        file: PathBuf,

        /// Category for records that carry none
        #[arg(long)]
        category: Option<String>,

        /// Entries per request (defaults to corpus.load_batch_size)
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Show corpus size per category
    Stats {
        /// Show statistics in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show daemon and index status
    Status,

    /// Stop the running daemon
    Stop,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
