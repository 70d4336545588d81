//! Command implementations for reposync-cli

pub mod list;
pub mod plan;
pub mod run;
pub mod scan;

pub use list::run_list;
pub use plan::run_plan;
pub use run::{RunArgs, run_pass};
pub use scan::run_scan;

use colored::{ColoredString, Colorize};
use reposync_core::SyncStatus;

/// Status label coloured by how much attention it needs.
pub(crate) fn paint(status: SyncStatus) -> ColoredString {
    let label = format!("{:<17}", status.as_str());
    match status {
        SyncStatus::Pulled | SyncStatus::Pushed => label.green().bold(),
        SyncStatus::UpToDate => label.green(),
        SyncStatus::Ahead | SyncStatus::DryRun => label.cyan(),
        SyncStatus::Dirty | SyncStatus::Diverged => label.yellow().bold(),
        SyncStatus::Error => label.red().bold(),
        _ => label.dimmed(),
    }
}
