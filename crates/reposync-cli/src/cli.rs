//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// reposync - Keep local git working copies in step with their remotes
#[derive(Parser, Debug)]
#[command(name = "reposync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true, env = "REPOSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run one reconciliation pass over every configured repository
    ///
    /// Behind branches are fast-forwarded, ahead branches pushed when
    /// allowed. Dirty, diverged and detached repositories are reported and
    /// left alone.
    Run {
        /// Classify only; change nothing
        #[arg(long)]
        dry_run: bool,

        /// Push ahead and unpublished branches even if auto_push is off
        #[arg(long)]
        force_push: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,

        /// Repositories processed concurrently
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        workers: Option<u64>,

        /// Timeout for each git operation, in seconds
        #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
        timeout: Option<u64>,
    },

    /// Show what a pass would do, without doing it
    Plan {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List configured repositories
    List,

    /// Find untracked repositories under a directory
    Scan {
        /// Directory whose immediate subdirectories are searched
        root: PathBuf,

        /// Append the repositories found to the configuration
        #[arg(long)]
        add: bool,
    },
}
