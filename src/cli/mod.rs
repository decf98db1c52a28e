//! Command line interface for inspecting and maintaining the durable store.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// evalcache - inspect and maintain the chess evaluation cache.
#[derive(Parser, Debug)]
#[command(name = "evalcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "evalcache.toml")]
    pub config: PathBuf,

    /// Verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors.
    #[arg(short, long)]
    pub quiet: bool,

    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Writes a default configuration and data directory.
    Init {
        /// Target directory (default: current directory).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Shows durable store statistics.
    Status,

    /// Prints a cached value as JSON.
    Get {
        /// Cache key, e.g. `eval:<fen>`.
        key: String,
    },

    /// Removes expired and over-capacity entries.
    Purge,

    /// Removes every entry in the configured namespace.
    Clear,

    /// Shows version.
    Version,
}
