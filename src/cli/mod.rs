//! Command-line interface

pub mod commands;
pub mod output;
pub mod terminal_output;

use clap::{Parser, Subcommand};
use commands::{HistoryCommand, ProfileCommand, PruneCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Cross-compile profile store and matrix CI runner
#[derive(Debug, Parser, Clone)]
#[command(name = "crossci")]
#[command(version = "0.1.0")]
#[command(about = "Run cross-compilation build matrices and publish runtime packages", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a workflow across its build matrix
    Run(RunCommand),

    /// Validate a workflow configuration
    Validate(ValidateCommand),

    /// Inspect cross-compilation profiles
    Profile(ProfileCommand),

    /// Delete old package versions from a local feed
    Prune(PruneCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
