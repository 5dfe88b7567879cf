//! CLI module for Recap.

pub mod commands;
mod output;
pub mod preflight;

pub use output::{format_size, Output};

use clap::{Parser, Subcommand};

/// Recap - streaming YouTube video summaries
///
/// Serves an SSE endpoint that turns YouTube links into timestamped summaries,
/// with per-session rate limiting, a concurrency cap and a persistent cache.
#[derive(Parser, Debug)]
#[command(name = "recap")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check system requirements and configuration
    Doctor,

    /// Start the HTTP server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one prompt through the pipeline and print the response
    Summarize {
        /// Prompt, usually containing a YouTube URL
        prompt: String,

        /// Session id used for rate limiting
        #[arg(long, default_value = "cli")]
        session: String,
    },

    /// Inspect or clean the summary cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show entry counts and size
    Stats,

    /// Remove one video's summary, or everything
    Clear {
        /// YouTube URL or video id (omit to clear all)
        video: Option<String>,
    },

    /// Delete expired entries
    Prune,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
