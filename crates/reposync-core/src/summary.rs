//! Pass summary

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{SyncResult, SyncStatus};

/// Aggregate of one pass, handed to the outcome sink at pass end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub total: usize,
    pub pulled: usize,
    pub pushed: usize,
    pub up_to_date: usize,
    pub dirty: usize,
    pub errors: usize,
    pub diverged: usize,
    pub ahead: usize,
    pub dry_run_planned: usize,
    /// Every `skipped-*` status together
    pub skipped: usize,
    pub by_status: BTreeMap<SyncStatus, usize>,
    /// Results with status error, diverged or dirty, in pass order
    pub attention: Vec<SyncResult>,
}

impl RunSummary {
    pub fn from_results(
        results: &[SyncResult],
        started_at: DateTime<Utc>,
        dry_run: bool,
    ) -> Self {
        let mut by_status = BTreeMap::new();
        for result in results {
            *by_status.entry(result.status).or_insert(0) += 1;
        }
        let count = |status| by_status.get(&status).copied().unwrap_or(0);

        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            dry_run,
            total: results.len(),
            pulled: count(SyncStatus::Pulled),
            pushed: count(SyncStatus::Pushed),
            up_to_date: count(SyncStatus::UpToDate),
            dirty: count(SyncStatus::Dirty),
            errors: count(SyncStatus::Error),
            diverged: count(SyncStatus::Diverged),
            ahead: count(SyncStatus::Ahead),
            dry_run_planned: count(SyncStatus::DryRun),
            skipped: results.iter().filter(|r| r.status.is_skipped()).count(),
            attention: results
                .iter()
                .filter(|r| r.status.needs_attention())
                .cloned()
                .collect(),
            by_status,
        }
    }

    pub fn count(&self, status: SyncStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    /// True when nothing needs an operator.
    pub fn is_clean(&self) -> bool {
        self.attention.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} repositories: {} pulled, {} pushed, {} up-to-date, {} ahead, {} dirty, {} diverged, {} errors, {} skipped",
            self.total,
            self.pulled,
            self.pushed,
            self.up_to_date,
            self.ahead,
            self.dirty,
            self.diverged,
            self.errors,
            self.skipped,
        )?;
        if self.dry_run {
            write!(f, " (dry run, {} planned)", self.dry_run_planned)?;
        }
        Ok(())
    }
}
