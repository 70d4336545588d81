//! The `run` command: one reconciliation pass

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use reposync_core::{
    EngineOptions, FanoutSink, JsonlSink, Orchestrator, OutcomeSink, PassLock, RunOverrides,
    SyncConfig, TracingSink, load_config,
};
use reposync_git::Git2Client;
use serde_json::json;

use super::paint;
use crate::error::Result;

/// Flags for `reposync run`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunArgs {
    pub dry_run: bool,
    pub force_push: bool,
    pub json: bool,
    pub workers: Option<usize>,
    pub timeout: Option<u64>,
    pub verbose: bool,
}

/// Run one pass over the repositories in `config_path`.
///
/// Per-repository failures are reported, never returned: the command only
/// fails when the configuration is unusable or another pass holds the lock.
pub fn run_pass(config_path: &Path, args: RunArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let _lock = PassLock::try_acquire(PassLock::path_for(config_path))?;

    let mut options = EngineOptions::from(&config.engine);
    if let Some(workers) = args.workers {
        options.workers = workers;
    }
    if let Some(secs) = args.timeout {
        options.timeout = Duration::from_secs(secs);
    }

    let orchestrator = Orchestrator::new(Arc::new(Git2Client::new()), build_sink(&config)?, options);
    let overrides = RunOverrides {
        verbose: args.verbose,
        dry_run: args.dry_run,
        force_push: args.force_push,
    };
    let (summary, results) =
        orchestrator.run_with_results(&config.repositories, &config.policy, overrides)?;

    if args.json {
        let report = json!({ "summary": summary, "results": results });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if args.dry_run {
        println!("{} Dry run: nothing will be changed", "=>".blue().bold());
    }
    for result in &results {
        println!("  {} {:<20} {}", paint(result.status), result.name, result.reason.dimmed());
    }
    println!();
    println!("{} {}", "Summary:".bold(), summary);

    if !summary.attention.is_empty() {
        println!();
        println!("{}", "Needs attention:".yellow().bold());
        for result in &summary.attention {
            println!("   {} {}: {}", "!".yellow(), result.name.cyan(), result.reason);
        }
    }

    Ok(())
}

/// Tracing always; the JSON-lines log too when one is configured.
fn build_sink(config: &SyncConfig) -> Result<Arc<dyn OutcomeSink>> {
    let mut sink = FanoutSink::new().with(Arc::new(TracingSink));
    if let Some(log_file) = &config.engine.log_file {
        sink = sink.with(Arc::new(JsonlSink::open(log_file)?));
    }
    Ok(Arc::new(sink))
}
