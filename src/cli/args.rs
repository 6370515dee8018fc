use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Top-level CLI entrypoint for `codesearch`.
#[derive(Parser, Debug)]
#[command(
    name = "codesearch",
    about = "Trigram + token search over a workspace's files and symbols",
    author = "codesearch developers"
)]
pub struct Cli {
    /// Workspace root to operate on.
    #[arg(short = 'C', long = "root", default_value = ".", global = true)]
    pub root: PathBuf,

    /// Path to the persistent index file (ignored with `--storage memory`).
    #[arg(long = "index-path", default_value = ".codesearch/index.sqlite", global = true)]
    pub index_path: PathBuf,

    /// Path to a `codesearch.toml` configuration file.
    #[arg(long = "config", env = "CODESEARCH_CONFIG", global = true)]
    pub config_path: Option<PathBuf>,

    /// Storage backend to use.
    #[arg(long = "storage", value_enum, global = true)]
    pub storage: Option<StorageArg>,

    /// Enable verbose logging.
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageArg {
    Persistent,
    Memory,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the index if it doesn't exist yet; otherwise a no-op.
    Index,
    /// Drop and rebuild the index from scratch.
    Refresh,
    /// Run a query and print ranked results.
    Search(SearchArgs),
    /// Print index totals.
    Stats,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// The search query.
    pub query: String,

    /// Maximum number of results to print.
    #[arg(short = 'n', long = "limit", default_value_t = 20)]
    pub limit: usize,

    /// Emit results as JSON instead of a text table.
    #[arg(long = "json")]
    pub json: bool,
}
