//! Repository Inspector
//!
//! Builds a [`RepositoryState`] snapshot for one descriptor without
//! touching the working tree. Checks run in a fixed order and stop at the
//! first failing precondition:
//!
//! 1. path exists
//! 2. path holds git metadata
//! 3. the remote resolves to a URL
//! 4. fetch
//! 5. working tree cleanliness
//! 6. HEAD is on a branch
//! 7. the branch has commits, and its remote-tracking ref exists
//! 8. merge base of local and remote tips
//!
//! The fetch only moves remote-tracking refs, so dirty trees are fetched
//! too.

use reposync_git::{OpContext, VcsClient};

use crate::Result;
use crate::config::RepositoryDescriptor;
use crate::model::{Inspection, Precondition, RepositoryState};

pub struct Inspector<'a> {
    client: &'a dyn VcsClient,
    ctx: &'a OpContext,
    default_remote: &'a str,
}

impl<'a> Inspector<'a> {
    pub fn new(client: &'a dyn VcsClient, ctx: &'a OpContext, default_remote: &'a str) -> Self {
        Self {
            client,
            ctx,
            default_remote,
        }
    }

    /// Inspect one repository.
    ///
    /// # Errors
    ///
    /// Returns an operational error (fetch failure, timeout, unreadable
    /// repository). Failed preconditions are not errors; they come back as
    /// an [`Inspection`] with `failed` set.
    pub fn inspect(&self, descriptor: &RepositoryDescriptor) -> Result<Inspection> {
        let path = descriptor.path.as_path();
        let remote = descriptor.remote_or(self.default_remote);
        let mut state = RepositoryState::default();

        if !path.exists() {
            return Ok(Inspection::failed(state, Precondition::NoPath));
        }
        state.has_path = true;

        if !self.client.is_repository(path) {
            return Ok(Inspection::failed(state, Precondition::NotRepo));
        }
        state.has_vcs_dir = true;

        if self.client.remote_url(path, remote, self.ctx)?.is_none() {
            return Ok(Inspection::failed(state, Precondition::NoRemote));
        }
        state.has_remote = true;

        self.client.fetch(path, remote, self.ctx)?;

        state.is_dirty = self.client.is_dirty(path, self.ctx)?;

        let Some(branch) = self.client.current_branch(path, self.ctx)? else {
            return Ok(Inspection::failed(state, Precondition::Detached));
        };

        state.local_ref = self.client.local_ref(path, &branch, self.ctx)?;
        state.current_branch = Some(branch.clone());
        if state.local_ref.is_none() {
            return Ok(Inspection::failed(state, Precondition::Empty));
        }

        state.remote_ref = self.client.remote_ref(path, remote, &branch, self.ctx)?;
        state.remote_branch_exists = state.remote_ref.is_some();

        if let (Some(local), Some(remote_tip)) = (&state.local_ref, &state.remote_ref) {
            state.merge_base_ref = self.client.merge_base(path, local, remote_tip, self.ctx)?;
        }

        tracing::debug!(
            repo = %descriptor.name,
            branch = %branch,
            dirty = state.is_dirty,
            local = ?state.local_ref,
            remote = ?state.remote_ref,
            merge_base = ?state.merge_base_ref,
            "Inspected"
        );

        Ok(Inspection::ready(state))
    }
}
