//! Inspector output

use reposync_git::CommitId;
use serde::{Deserialize, Serialize};

use super::SyncStatus;

/// A precondition that stops a repository from being reconciled.
///
/// Expected and non-retryable within a pass: the repository is skipped
/// until the condition changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Precondition {
    Disabled,
    NoPath,
    NotRepo,
    NoRemote,
    Detached,
    /// Branch exists but has no commits yet
    Empty,
}

impl Precondition {
    pub fn status(self) -> SyncStatus {
        match self {
            Self::Disabled => SyncStatus::SkippedDisabled,
            Self::NoPath => SyncStatus::SkippedNoPath,
            Self::NotRepo => SyncStatus::SkippedNotRepo,
            Self::NoRemote => SyncStatus::SkippedNoRemote,
            Self::Detached => SyncStatus::SkippedDetached,
            Self::Empty => SyncStatus::SkippedEmpty,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Disabled => "disabled in configuration",
            Self::NoPath => "path does not exist",
            Self::NotRepo => "path is not a git repository",
            Self::NoRemote => "no remote configured",
            Self::Detached => "HEAD is detached",
            Self::Empty => "branch has no commits",
        }
    }
}

/// Point-in-time snapshot of one working copy.
///
/// Fields are filled in inspection order; once a precondition fails, the
/// fields after it keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryState {
    pub has_path: bool,
    pub has_vcs_dir: bool,
    pub has_remote: bool,
    pub is_dirty: bool,
    /// `None` when HEAD is detached
    pub current_branch: Option<String>,
    pub remote_branch_exists: bool,
    pub local_ref: Option<CommitId>,
    pub remote_ref: Option<CommitId>,
    pub merge_base_ref: Option<CommitId>,
}

/// Inspector result: the (possibly partial) state plus the failing
/// precondition, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub state: RepositoryState,
    pub failed: Option<Precondition>,
}

impl Inspection {
    pub fn ready(state: RepositoryState) -> Self {
        Self {
            state,
            failed: None,
        }
    }

    pub fn failed(state: RepositoryState, precondition: Precondition) -> Self {
        Self {
            state,
            failed: Some(precondition),
        }
    }

    /// Disabled descriptors are never inspected.
    pub fn disabled() -> Self {
        Self::failed(RepositoryState::default(), Precondition::Disabled)
    }
}
