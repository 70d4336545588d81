//! The `plan` command: classify without executing

use std::path::Path;
use std::sync::Arc;

use colored::Colorize;
use reposync_core::{EngineOptions, Orchestrator, TracingSink, load_config};
use reposync_git::Git2Client;
use serde_json::{Value, json};

use super::paint;
use crate::error::Result;

/// Inspect every repository and print the action a pass would take.
///
/// Inspection fetches, so remote-tracking refs are refreshed, but no
/// branch, working tree or remote is changed.
pub fn run_plan(config_path: &Path, json_output: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let orchestrator = Orchestrator::new(
        Arc::new(Git2Client::new()),
        Arc::new(TracingSink),
        EngineOptions::from(&config.engine),
    );

    let plan = orchestrator.plan(&config.repositories, &config.policy)?;

    if json_output {
        let entries: Vec<Value> = plan
            .iter()
            .map(|entry| {
                json!({
                    "name": entry.name,
                    "status": entry.status(),
                    "action": entry.describe(),
                    "state": entry.state,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{} Planned actions", "=>".blue().bold());
    for entry in &plan {
        println!("  {} {:<20} {}", paint(entry.status()), entry.name, entry.describe().dimmed());
    }
    Ok(())
}
