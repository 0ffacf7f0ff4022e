//! CLI command definitions

use crate::core::{config::DEFAULT_RETENTION, TriggerEvent};
use crate::execution::SchedulingStrategy;
use clap::{Args, Subcommand};

/// Run a workflow
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: String,

    /// Branch the run is for
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Event that triggered the run
    #[arg(long, value_enum, default_value_t = TriggerEventArg::Push)]
    pub event: TriggerEventArg,

    /// Directory of cross files
    #[arg(long)]
    pub profiles: Option<String>,

    /// Variable overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub var: Vec<(String, String)>,

    /// Environment variable to pass to steps as a secret
    #[arg(long)]
    pub secret: Vec<String>,

    /// Only run these entries (name or os/arch)
    #[arg(long)]
    pub entry: Vec<String>,

    /// Scheduling strategy: sequential, parallel, or a maximum entry count
    #[arg(long, value_parser = parse_strategy)]
    pub strategy: Option<SchedulingStrategy>,

    /// Print commands instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Local package feed directory (overrides the workflow's registry)
    #[arg(long)]
    pub registry: Option<String>,

    /// Directory for saved caches
    #[arg(long)]
    pub cache_dir: Option<String>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

impl RunCommand {
    /// Dry runs never touch the history store
    pub fn records_history(&self) -> bool {
        !(self.no_history || self.dry_run)
    }
}

/// Validate a workflow configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: String,

    /// Directory of cross files referenced by the matrix
    #[arg(long)]
    pub profiles: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Inspect cross-compilation profiles
#[derive(Debug, Args, Clone)]
pub struct ProfileCommand {
    #[command(subcommand)]
    pub action: ProfileAction,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ProfileAction {
    /// List the profiles in a directory
    List {
        #[arg(long, default_value = "cross")]
        dir: String,

        #[arg(long)]
        json: bool,
    },

    /// Show one profile's binaries and flags
    Show {
        name: String,

        #[arg(long, default_value = "cross")]
        dir: String,

        #[arg(long)]
        json: bool,
    },
}

/// Delete old package versions
#[derive(Debug, Args, Clone)]
pub struct PruneCommand {
    /// Local package feed directory
    #[arg(long)]
    pub registry: String,

    /// Package identifier
    #[arg(long)]
    pub package: String,

    /// Number of most recent versions to keep
    #[arg(long, default_value_t = DEFAULT_RETENTION, value_parser = parse_keep)]
    pub keep: usize,

    /// Show what would be deleted without deleting
    #[arg(long)]
    pub dry_run: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Workflow name to filter by
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show a single run by ID
    #[arg(long)]
    pub run_id: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Trigger event argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TriggerEventArg {
    Push,
    PullRequest,
    Manual,
}

impl From<TriggerEventArg> for TriggerEvent {
    fn from(arg: TriggerEventArg) -> Self {
        match arg {
            TriggerEventArg::Push => TriggerEvent::Push,
            TriggerEventArg::PullRequest => TriggerEvent::PullRequest,
            TriggerEventArg::Manual => TriggerEvent::Manual,
        }
    }
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}

fn parse_strategy(s: &str) -> Result<SchedulingStrategy, String> {
    s.parse()
}

fn parse_keep(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must keep at least one version".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}
