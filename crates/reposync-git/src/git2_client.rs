//! [`VcsClient`] backed by libgit2
//!
//! Every call opens the repository fresh inside an [`OpContext`] worker so
//! no `git2::Repository` handle outlives a single operation or crosses a
//! thread boundary.

use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{
    Cred, ErrorCode, FetchOptions, Oid, PushOptions, RemoteCallbacks, Repository, Status,
    StatusOptions,
};

use crate::context::Interrupt;
use crate::{CommitId, Error, OpContext, Result, VcsClient};

/// Credential callbacks are re-invoked by libgit2 on rejection; give up
/// after this many attempts instead of looping.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Production client using `git2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Git2Client;

impl Git2Client {
    pub fn new() -> Self {
        Self
    }
}

fn open(path: &Path) -> Result<Repository> {
    Ok(Repository::open(path)?)
}

fn parse_oid(id: &CommitId) -> Result<Oid> {
    Ok(Oid::from_str(id.as_str())?)
}

fn resolve(repo: &Repository, refname: &str) -> Result<Option<CommitId>> {
    match repo.refname_to_id(refname) {
        Ok(oid) => Ok(Some(oid.into())),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn working_tree_dirty(repo: &Repository) -> Result<bool> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .include_ignored(false)
        .recurse_untracked_dirs(false)
        .exclude_submodules(true);

    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(statuses
        .iter()
        .any(|entry| entry.status() != Status::CURRENT && !entry.status().is_ignored()))
}

/// Remote callbacks shared by fetch and push: credential lookup plus
/// interrupt polling on every progress tick.
fn remote_callbacks<'a>(repo: &Repository, interrupt: &'a Interrupt) -> RemoteCallbacks<'a> {
    let cfg = repo.config().ok();
    let mut attempts = 0usize;

    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("credentials rejected"));
        }
        if allowed.is_ssh_key()
            && let Some(user) = username_from_url
        {
            return Cred::ssh_key_from_agent(user);
        }
        if allowed.is_user_pass_plaintext()
            && let Some(ref cfg) = cfg
            && let Ok(cred) = Cred::credential_helper(cfg, url, username_from_url)
        {
            return Ok(cred);
        }
        Cred::default()
    });
    callbacks.transfer_progress(|_| !interrupt.should_stop());
    callbacks.sideband_progress(|_| !interrupt.should_stop());
    callbacks.push_negotiation(|_| {
        if interrupt.should_stop() {
            Err(git2::Error::from_str("push interrupted"))
        } else {
            Ok(())
        }
    });
    callbacks
}

impl VcsClient for Git2Client {
    fn is_repository(&self, path: &Path) -> bool {
        // `.git` is a directory for normal clones and a file for worktrees.
        path.join(".git").exists()
    }

    fn remote_url(&self, path: &Path, remote: &str, ctx: &OpContext) -> Result<Option<String>> {
        let path = path.to_path_buf();
        let remote = remote.to_string();
        ctx.run("remote-url", move |_| {
            let repo = open(&path)?;
            match repo.find_remote(&remote) {
                Ok(r) => Ok(r.url().map(str::to_string)),
                Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) => {
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn fetch(&self, path: &Path, remote: &str, ctx: &OpContext) -> Result<()> {
        let path = path.to_path_buf();
        let remote_name = remote.to_string();
        ctx.run("fetch", move |interrupt| {
            let repo = open(&path)?;
            let mut remote = repo
                .find_remote(&remote_name)
                .map_err(|_| Error::RemoteNotFound {
                    name: remote_name.clone(),
                })?;

            let mut fo = FetchOptions::new();
            fo.remote_callbacks(remote_callbacks(&repo, interrupt));

            // Empty refspec list uses the remote's configured fetch refspecs.
            remote.fetch(&[] as &[&str], Some(&mut fo), Some("reposync: fetch"))?;
            tracing::debug!(path = %path.display(), remote = %remote_name, "Fetched");
            Ok(())
        })
    }

    fn is_dirty(&self, path: &Path, ctx: &OpContext) -> Result<bool> {
        let path = path.to_path_buf();
        ctx.run("status", move |_| working_tree_dirty(&open(&path)?))
    }

    fn current_branch(&self, path: &Path, ctx: &OpContext) -> Result<Option<String>> {
        let path = path.to_path_buf();
        ctx.run("current-branch", move |_| {
            let repo = open(&path)?;
            // Read HEAD symbolically so unborn branches still report a name.
            let head = repo.find_reference("HEAD")?;
            Ok(head
                .symbolic_target()
                .and_then(|target| target.strip_prefix("refs/heads/"))
                .map(str::to_string))
        })
    }

    fn local_ref(&self, path: &Path, branch: &str, ctx: &OpContext) -> Result<Option<CommitId>> {
        let path = path.to_path_buf();
        let refname = format!("refs/heads/{branch}");
        ctx.run("local-ref", move |_| resolve(&open(&path)?, &refname))
    }

    fn remote_ref(
        &self,
        path: &Path,
        remote: &str,
        branch: &str,
        ctx: &OpContext,
    ) -> Result<Option<CommitId>> {
        let path = path.to_path_buf();
        let refname = format!("refs/remotes/{remote}/{branch}");
        ctx.run("remote-ref", move |_| resolve(&open(&path)?, &refname))
    }

    fn merge_base(
        &self,
        path: &Path,
        a: &CommitId,
        b: &CommitId,
        ctx: &OpContext,
    ) -> Result<Option<CommitId>> {
        let path = path.to_path_buf();
        let (a, b) = (parse_oid(a)?, parse_oid(b)?);
        ctx.run("merge-base", move |_| {
            let repo = open(&path)?;
            match repo.merge_base(a, b) {
                Ok(oid) => Ok(Some(oid.into())),
                Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn fast_forward(
        &self,
        path: &Path,
        branch: &str,
        target: &CommitId,
        ctx: &OpContext,
    ) -> Result<CommitId> {
        let path = path.to_path_buf();
        let branch = branch.to_string();
        let target = parse_oid(target)?;
        ctx.run("fast-forward", move |interrupt| {
            fast_forward(&path, &branch, target, interrupt)
        })
    }

    fn push(&self, path: &Path, remote: &str, branch: &str, ctx: &OpContext) -> Result<()> {
        let path = path.to_path_buf();
        let remote_name = remote.to_string();
        let branch = branch.to_string();
        ctx.run("push", move |interrupt| {
            push(&path, &remote_name, &branch, interrupt)
        })
    }
}

fn fast_forward(
    path: &Path,
    branch: &str,
    target: Oid,
    interrupt: &Interrupt,
) -> Result<CommitId> {
    let repo = open(path)?;

    // The tree may have changed since inspection.
    if working_tree_dirty(&repo)? {
        return Err(Error::DirtyWorkingTree {
            path: path.to_path_buf(),
        });
    }

    let refname = format!("refs/heads/{branch}");
    let head = repo.find_reference("HEAD")?;
    if head.symbolic_target() != Some(refname.as_str()) {
        return Err(Error::CannotFastForward {
            message: format!("'{branch}' is no longer checked out"),
        });
    }

    let mut reference = repo
        .find_reference(&refname)
        .map_err(|_| Error::BranchNotFound {
            name: branch.to_string(),
        })?;
    let current = reference.peel_to_commit()?.id();

    if current == target {
        return Ok(target.into());
    }
    if !repo.graph_descendant_of(target, current)? {
        return Err(Error::CannotFastForward {
            message: format!(
                "{} does not descend from {} on '{branch}'",
                target, current
            ),
        });
    }

    // Update the working tree first with a non-forcing checkout; it fails
    // rather than overwrite anything that differs from the old HEAD.
    // Last point where nothing has changed. Past it the ref move always
    // follows the checkout, so tree and branch never disagree.
    let target_commit = repo.find_commit(target)?;
    interrupt.check("fast-forward")?;
    let mut checkout = CheckoutBuilder::new();
    checkout.safe();
    repo.checkout_tree(target_commit.as_object(), Some(&mut checkout))?;

    reference.set_target(target, &format!("reposync: fast-forward to {target}"))?;
    tracing::debug!(path = %path.display(), branch = %branch, to = %target, "Fast-forwarded");

    Ok(target.into())
}

fn push(path: &Path, remote_name: &str, branch: &str, interrupt: &Interrupt) -> Result<()> {
    use std::cell::RefCell;

    let repo = open(path)?;
    let mut remote = repo
        .find_remote(remote_name)
        .map_err(|_| Error::RemoteNotFound {
            name: remote_name.to_string(),
        })?;

    // No leading '+': the server must accept it as a fast-forward.
    let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
    let rejection: RefCell<Option<(String, String)>> = RefCell::new(None);

    {
        let mut callbacks = remote_callbacks(&repo, interrupt);
        callbacks.push_update_reference(|refname, status| {
            if let Some(msg) = status {
                *rejection.borrow_mut() = Some((refname.to_string(), msg.to_string()));
            }
            Ok(())
        });

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);
        interrupt.check("push")?;
        remote.push(&[refspec.as_str()], Some(&mut push_options))?;
    }

    if let Some((refname, message)) = rejection.into_inner() {
        return Err(Error::PushRejected { refname, message });
    }

    tracing::debug!(path = %path.display(), remote = %remote_name, branch = %branch, "Pushed");
    Ok(())
}
