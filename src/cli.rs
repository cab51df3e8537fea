//! CLI definitions for jobweave.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// jobweave CLI.
#[derive(Parser)]
#[command(name = "jobweave")]
#[command(about = "Run jobs on timers with retries and mirrored state")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path. Defaults to the user config directory.
    #[arg(short, long, global = true, env = "JOBWEAVE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the configured timers until interrupted (default)
    Run {
        /// Log the state of every timer as seen through a client proxy
        #[arg(long)]
        mirror: bool,
    },

    /// Validate the configuration and exit
    Check,
}
