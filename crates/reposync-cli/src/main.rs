//! reposync CLI
//!
//! Invocation surface for the reconciliation engine: run a pass, preview
//! one, and manage the list of tracked repositories.

mod cli;
mod commands;
mod error;

use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{Cli, Commands};
use commands::RunArgs;
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        println!("{} Repository reconciliation", "reposync".green().bold());
        println!();
        println!("Run {} for available commands.", "reposync --help".cyan());
        return Ok(());
    };

    let config_path = resolve_config(cli.config)?;
    tracing::debug!(config = %config_path.display(), "Using configuration");

    match command {
        Commands::Run {
            dry_run,
            force_push,
            json,
            workers,
            timeout,
        } => commands::run_pass(
            &config_path,
            RunArgs {
                dry_run,
                force_push,
                json,
                workers: workers.map(|w| usize::try_from(w).unwrap_or(usize::MAX)),
                timeout,
                verbose: cli.verbose,
            },
        ),
        Commands::Plan { json } => commands::run_plan(&config_path, json),
        Commands::List => commands::run_list(&config_path),
        Commands::Scan { root, add } => commands::run_scan(&config_path, &root, add),
    }
}

/// Logs go to stderr so `--json` output stays parseable.
fn init_tracing(verbose: bool) {
    let result = if verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    };
    if let Err(e) = result {
        eprintln!("{}: {}", "warning".yellow().bold(), e);
    }
    tracing::debug!("Verbose mode enabled");
}

fn resolve_config(flag: Option<PathBuf>) -> Result<PathBuf> {
    flag.or_else(reposync_core::default_config_path).ok_or_else(|| {
        CliError::user("No configuration directory found; pass --config or set REPOSYNC_CONFIG")
    })
}
