//! Decision engine output

use std::fmt;

use super::{Precondition, SyncStatus};

/// Why a repository is left alone this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Precondition(Precondition),
    /// Branch never pushed and pushing is not allowed
    NoRemoteBranch,
}

/// What the executor should do with one repository. Produced once per
/// repository per pass and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    Skip(SkipReason),
    /// Dirty tree: the inspection fetch is all that happens
    FetchOnly,
    ReportUpToDate,
    PullFastForward(String),
    PushNewBranch(String),
    PushExisting(String),
    ReportDiverged,
    ReportAhead,
    /// A mutating action that dry-run mode suppressed
    ReportDryRun(Box<PlannedAction>),
}

impl PlannedAction {
    /// Whether executing this action changes a ref, the tree, or the remote.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::PullFastForward(_) | Self::PushNewBranch(_) | Self::PushExisting(_)
        )
    }

    /// The action dry-run mode would have executed, or `self`.
    pub fn intended(&self) -> &PlannedAction {
        match self {
            Self::ReportDryRun(inner) => inner.intended(),
            other => other,
        }
    }

    /// Status the executor reports when the action succeeds.
    pub fn status(&self) -> SyncStatus {
        match self {
            Self::Skip(SkipReason::Precondition(p)) => p.status(),
            Self::Skip(SkipReason::NoRemoteBranch) | Self::ReportAhead => SyncStatus::Ahead,
            Self::FetchOnly => SyncStatus::Dirty,
            Self::ReportUpToDate => SyncStatus::UpToDate,
            Self::PullFastForward(_) => SyncStatus::Pulled,
            Self::PushNewBranch(_) | Self::PushExisting(_) => SyncStatus::Pushed,
            Self::ReportDiverged => SyncStatus::Diverged,
            Self::ReportDryRun(_) => SyncStatus::DryRun,
        }
    }
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip(SkipReason::Precondition(p)) => write!(f, "skip ({})", p.describe()),
            Self::Skip(SkipReason::NoRemoteBranch) => write!(f, "skip (branch not on remote)"),
            Self::FetchOnly => write!(f, "fetch only"),
            Self::ReportUpToDate => write!(f, "nothing to do"),
            Self::PullFastForward(branch) => write!(f, "fast-forward '{branch}'"),
            Self::PushNewBranch(branch) => write!(f, "publish new branch '{branch}'"),
            Self::PushExisting(branch) => write!(f, "push '{branch}'"),
            Self::ReportDiverged => write!(f, "report divergence"),
            Self::ReportAhead => write!(f, "report ahead"),
            Self::ReportDryRun(inner) => write!(f, "would {inner}"),
        }
    }
}
