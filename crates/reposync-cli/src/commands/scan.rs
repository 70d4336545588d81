//! The `scan` command: discover untracked repositories

use std::path::Path;

use colored::Colorize;
use reposync_core::scan::{add_to_config, discover};
use reposync_core::{SyncConfig, load_config};
use reposync_git::Git2Client;

use crate::error::{CliError, Result};

/// List repositories directly under `root` that the configuration does not
/// track yet, optionally adding them.
pub fn run_scan(config_path: &Path, root: &Path, add: bool) -> Result<()> {
    if !root.is_dir() {
        return Err(CliError::user(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let known = if config_path.exists() {
        load_config(config_path)?
    } else {
        SyncConfig::default()
    };
    let found = discover(root, &known.repositories, &Git2Client::new())?;

    if found.is_empty() {
        println!("No untracked repositories under {}", root.display());
        return Ok(());
    }

    println!("{} Found {} untracked repositories:", "=>".blue().bold(), found.len());
    for descriptor in &found {
        println!("  {:<20} {}", descriptor.name.green(), descriptor.path.display());
    }

    if add {
        let added = add_to_config(config_path, &found)?;
        println!();
        println!(
            "{} Added {} to {}",
            "OK".green().bold(),
            added,
            config_path.display()
        );
    } else {
        println!();
        println!("Run with {} to track them.", "--add".cyan());
    }
    Ok(())
}
