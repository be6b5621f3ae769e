//! ThreatER collector library
//!
//! Incremental, checkpointed collection of ThreatER v3 API resources as JSON
//! line events.
//!
//! # Overview
//!
//! - **Streams**: a static catalog of [`streams::StreamDescriptor`]s, one per
//!   connector, interpreted by a single engine
//! - **Pagination**: cursor walks over `meta.next_cursor` ([`pagination`])
//! - **Checkpoints**: one high-water-mark per connector in SQLite
//!   ([`checkpoint`]), committed only after the sink is flushed
//! - **Sinks**: newline-delimited JSON on stdout or an append-only file
//!   ([`sink`])

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod checkpoint;
pub mod commands;
pub mod config;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod pagination;
pub mod sink;
pub mod streams;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use error::{ApiError, ApiErrorKind, CollectError, Result};
pub use orchestrator::{run_stream, RunOptions, RunSummary};

use crate::error::{EXIT_OK, EXIT_UNEXPECTED};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// threater-collect - incremental ThreatER API collector
#[derive(Parser, Debug)]
#[command(name = "threater-collect")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (defaults to ./threater.toml when present)
    #[arg(long, env = "THREATER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the checkpoint database
    #[arg(long, env = "THREATER_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,
}

impl Cli {
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(config::default_state_dir)
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect one stream from its last checkpoint
    Run {
        /// Connector name, with or without the `threater_` prefix
        stream: String,

        /// Append events to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Abort when a traversal needs more than this many pages
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_pages: Option<u32>,
    },

    /// Collect every enabled stream in catalog order
    RunEnabled {
        /// Append events to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the stream catalog
    Streams,

    /// Inspect or reset stored checkpoints
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommand,
    },

    /// Probe API connectivity and credentials
    Check,

    /// Emit an ingestion health event
    Health {
        /// Append the event to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Exit code for a failed [`Cli::try_parse`].
///
/// Requested help and version output succeed. Every usage error exits with
/// [`EXIT_UNEXPECTED`], leaving [`error::EXIT_API`] to API failures.
pub fn parse_error_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_OK,
        _ => EXIT_UNEXPECTED,
    }
}

/// Checkpoint subcommands
#[derive(Subcommand, Debug)]
pub enum CheckpointCommand {
    /// Print the stored checkpoint of a stream
    Show {
        stream: String,
    },

    /// Delete the stored checkpoint so the next run starts from scratch
    Reset {
        stream: String,
    },
}
