//! Per-pass data model
//!
//! All of these values are created during a pass and dropped at its end;
//! nothing here persists between passes.

mod action;
mod outcome;
mod state;

pub use action::{PlannedAction, SkipReason};
pub use outcome::{SyncResult, SyncStatus};
pub use state::{Inspection, Precondition, RepositoryState};
