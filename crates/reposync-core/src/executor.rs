//! Action Executor
//!
//! Performs exactly the version-control operations a [`PlannedAction`]
//! implies, scoped to one repository path. Failures are captured into a
//! [`SyncResult`] with status `error`; nothing propagates out of
//! [`Executor::execute`].

use std::path::Path;

use reposync_git::{CommitId, Error as GitError, OpContext, VcsClient};

use crate::config::RepositoryDescriptor;
use crate::model::{PlannedAction, RepositoryState, SkipReason, SyncResult};

pub struct Executor<'a> {
    client: &'a dyn VcsClient,
    ctx: &'a OpContext,
    default_remote: &'a str,
}

impl<'a> Executor<'a> {
    pub fn new(client: &'a dyn VcsClient, ctx: &'a OpContext, default_remote: &'a str) -> Self {
        Self {
            client,
            ctx,
            default_remote,
        }
    }

    /// Execute `action` against the repository `state` was inspected from.
    pub fn execute(
        &self,
        descriptor: &RepositoryDescriptor,
        state: &RepositoryState,
        action: &PlannedAction,
    ) -> SyncResult {
        match self.perform(descriptor, state, action) {
            Ok(result) => result,
            Err(message) => {
                tracing::debug!(repo = %descriptor.name, %action, error = %message, "Action failed");
                SyncResult::error(&descriptor.name, message)
            }
        }
    }

    fn perform(
        &self,
        descriptor: &RepositoryDescriptor,
        state: &RepositoryState,
        action: &PlannedAction,
    ) -> Result<SyncResult, String> {
        let name = descriptor.name.as_str();
        let result = |reason: String| SyncResult::new(name, action.status(), reason);

        match action {
            PlannedAction::Skip(SkipReason::Precondition(p)) => Ok(result(p.describe().into())),
            PlannedAction::Skip(SkipReason::NoRemoteBranch) => Ok(result(format!(
                "branch '{}' is not on the remote and pushing is disabled",
                state.current_branch.as_deref().unwrap_or_default()
            ))),
            PlannedAction::FetchOnly => Ok(result(
                "uncommitted changes; fetched without pulling".into(),
            )),
            PlannedAction::ReportUpToDate => Ok(result(format!(
                "local and remote at {}",
                short(state.local_ref.as_ref())
            ))),
            PlannedAction::ReportAhead => Ok(result(format!(
                "local {} is ahead of remote {}; pushing is disabled",
                short(state.local_ref.as_ref()),
                short(state.remote_ref.as_ref())
            ))),
            PlannedAction::ReportDiverged => Ok(result(format!(
                "local {} and remote {} diverged from {}; manual merge required",
                short(state.local_ref.as_ref()),
                short(state.remote_ref.as_ref()),
                short(state.merge_base_ref.as_ref())
            ))),
            PlannedAction::ReportDryRun(_) => Ok(result(action.to_string())),
            PlannedAction::PullFastForward(branch) => {
                let tip = self.pull(descriptor, state, branch)?;
                Ok(result(format!(
                    "fast-forwarded '{branch}' {}..{}",
                    short(state.local_ref.as_ref()),
                    tip.short()
                )))
            }
            PlannedAction::PushNewBranch(branch) => {
                let remote = descriptor.remote_or(self.default_remote);
                self.client
                    .push(&descriptor.path, remote, branch, self.ctx)
                    .map_err(|e| e.to_string())?;
                Ok(result(format!("published new branch '{branch}' to {remote}")))
            }
            PlannedAction::PushExisting(branch) => {
                let remote = descriptor.remote_or(self.default_remote);
                self.push_existing(descriptor, state, branch)?;
                Ok(result(format!(
                    "pushed '{branch}' {}..{} to {remote}",
                    short(state.remote_ref.as_ref()),
                    short(state.local_ref.as_ref())
                )))
            }
        }
    }

    fn pull(
        &self,
        descriptor: &RepositoryDescriptor,
        state: &RepositoryState,
        branch: &str,
    ) -> Result<CommitId, String> {
        let path = descriptor.path.as_path();
        let target = state
            .remote_ref
            .as_ref()
            .ok_or_else(|| format!("no remote tip for '{branch}'"))?;

        // The tree and the branch may have moved since inspection
        if self.client.is_dirty(path, self.ctx).map_err(|e| e.to_string())? {
            return Err("working tree changed since inspection; pull withheld".into());
        }
        let current = self
            .client
            .local_ref(path, branch, self.ctx)
            .map_err(|e| e.to_string())?;
        if current != state.local_ref {
            return Err(format!(
                "'{branch}' moved since inspection ({} -> {}); pull withheld",
                short(state.local_ref.as_ref()),
                short(current.as_ref())
            ));
        }

        match self.client.fast_forward(path, branch, target, self.ctx) {
            Ok(tip) => Ok(tip),
            Err(e @ (GitError::Timeout { .. } | GitError::Cancelled { .. })) => {
                self.settled_fast_forward(path, branch, target, &e)
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// An abandoned fast-forward may still complete. Wait for it, then
    /// report where the branch actually ended up.
    fn settled_fast_forward(
        &self,
        path: &Path,
        branch: &str,
        target: &CommitId,
        stopped: &GitError,
    ) -> Result<CommitId, String> {
        self.ctx.wait_for_workers();
        let fresh = OpContext::new(self.ctx.timeout());
        match self.client.local_ref(path, branch, &fresh) {
            Ok(Some(tip)) if &tip == target => {
                tracing::warn!(
                    path = %path.display(),
                    branch = %branch,
                    "Fast-forward completed after {stopped}"
                );
                Ok(tip)
            }
            _ => Err(stopped.to_string()),
        }
    }

    fn push_existing(
        &self,
        descriptor: &RepositoryDescriptor,
        state: &RepositoryState,
        branch: &str,
    ) -> Result<(), String> {
        let path = descriptor.path.as_path();
        let remote = descriptor.remote_or(self.default_remote);

        self.client
            .fetch(path, remote, self.ctx)
            .map_err(|e| e.to_string())?;
        let latest = self
            .client
            .remote_ref(path, remote, branch, self.ctx)
            .map_err(|e| e.to_string())?;
        if latest != state.remote_ref {
            return Err(format!(
                "remote '{branch}' moved since inspection ({} -> {}); push withheld",
                short(state.remote_ref.as_ref()),
                short(latest.as_ref())
            ));
        }

        self.client
            .push(path, remote, branch, self.ctx)
            .map_err(|e| e.to_string())
    }
}

fn short(id: Option<&CommitId>) -> &str {
    id.map_or("none", CommitId::short)
}
