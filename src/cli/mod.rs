//! CLI module for netcommit
//!
//! Argument parsing and subcommand dispatch for the `netcommit` binary.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// netcommit - staged configuration changes for Arista EOS
///
/// Stages a candidate configuration on the device, shows the device-computed
/// diff, commits it as a replace or a merge and rolls back to the snapshot
/// taken before the last merge.
#[derive(Parser, Debug, Clone)]
#[command(name = "netcommit")]
#[command(version)]
#[command(about = "Staged configuration changes for Arista EOS", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "NETCOMMIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Device host, overrides the configuration file
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// eAPI user, overrides the configuration file
    #[arg(short = 'u', long, global = true)]
    pub user: Option<String>,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
    /// YAML output
    Yaml,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Stage a candidate, show the diff and discard it
    Diff(commands::apply::DiffArgs),

    /// Stage a candidate, show the diff and commit it
    Apply(commands::apply::ApplyArgs),

    /// Abort the pending session and leftover sessions
    Discard,

    /// Restore the snapshot taken before the last merge commit
    Rollback,

    /// Show device identity
    Facts,

    /// Show interface state
    Interfaces,

    /// Show BGP neighbors
    Bgp,

    /// Show LLDP neighbors
    Lldp,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }
}
