//! The `list` command

use std::path::Path;

use colored::Colorize;
use reposync_core::load_config;

use crate::error::Result;

/// Print configured repositories and the active policy.
pub fn run_list(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    println!("{}", "Repositories".bold());
    println!();
    if config.repositories.is_empty() {
        println!("  {}", "(none configured)".dimmed());
    }
    for repo in &config.repositories {
        let state = if !repo.enabled {
            "disabled".dimmed()
        } else if repo.path.exists() {
            "enabled".green()
        } else {
            "missing".yellow()
        };
        println!(
            "  {:<20} {:<9} {} ({})",
            repo.name.cyan(),
            state,
            repo.path.display(),
            repo.remote_or(&config.engine.default_remote).dimmed()
        );
    }

    println!();
    println!(
        "{} pull={:?} auto_push={} auto_stash={}",
        "Policy:".dimmed(),
        config.policy.pull_strategy,
        config.policy.auto_push,
        config.policy.auto_stash
    );
    Ok(())
}
