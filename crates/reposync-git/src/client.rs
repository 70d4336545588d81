//! The version-control capability consumed by the reconciliation engine

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{OpContext, Result};

/// Identifier of a commit, as a hex object id.
///
/// Kept as an opaque string so fakes can use short symbolic ids such as
/// `"aaa"` while the git2 client uses full 40-character hashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines (first 7 characters).
    pub fn short(&self) -> &str {
        self.0.get(..7).unwrap_or(&self.0)
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<git2::Oid> for CommitId {
    fn from(oid: git2::Oid) -> Self {
        Self(oid.to_string())
    }
}

/// Everything the engine needs from a version-control system.
///
/// Read-only queries never touch the working tree. `fetch` only updates
/// remote-tracking refs. `fast_forward` and `push` are the only mutating
/// calls, and neither may discard uncommitted work or overwrite a ref
/// non-fast-forward.
pub trait VcsClient: Send + Sync {
    /// Whether `path` contains version-control metadata.
    fn is_repository(&self, path: &Path) -> bool;

    /// URL of the named remote, or `None` if it is not configured.
    fn remote_url(&self, path: &Path, remote: &str, ctx: &OpContext) -> Result<Option<String>>;

    /// Refresh remote-tracking refs from `remote`.
    fn fetch(&self, path: &Path, remote: &str, ctx: &OpContext) -> Result<()>;

    /// Whether any modified, staged, or untracked entry exists.
    fn is_dirty(&self, path: &Path, ctx: &OpContext) -> Result<bool>;

    /// Checked-out branch name, or `None` when HEAD is detached.
    fn current_branch(&self, path: &Path, ctx: &OpContext) -> Result<Option<String>>;

    /// Tip of the local branch, or `None` if it has no commits yet.
    fn local_ref(&self, path: &Path, branch: &str, ctx: &OpContext) -> Result<Option<CommitId>>;

    /// Tip of the remote-tracking ref for `branch`, or `None` if the
    /// remote has no such branch.
    fn remote_ref(
        &self,
        path: &Path,
        remote: &str,
        branch: &str,
        ctx: &OpContext,
    ) -> Result<Option<CommitId>>;

    /// Best common ancestor of two commits, or `None` for unrelated histories.
    fn merge_base(
        &self,
        path: &Path,
        a: &CommitId,
        b: &CommitId,
        ctx: &OpContext,
    ) -> Result<Option<CommitId>>;

    /// Advance the checked-out `branch` to `target`, which must descend
    /// from the current tip. Returns the new tip.
    fn fast_forward(
        &self,
        path: &Path,
        branch: &str,
        target: &CommitId,
        ctx: &OpContext,
    ) -> Result<CommitId>;

    /// Push `branch` to the same-named branch on `remote` (never forced).
    fn push(&self, path: &Path, remote: &str, branch: &str, ctx: &OpContext) -> Result<()>;
}
