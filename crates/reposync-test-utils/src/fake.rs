//! Scripted in-memory version-control client.
//!
//! Realism level: **FAKE**: no git at all. Each repository path maps to a
//! [`FakeRepo`] describing what the inspector should observe, and every
//! call is recorded so tests can assert exactly which operations ran.
//! Mutating calls update the scripted state the way git would, so a second
//! pass sees the result of the first.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use reposync_git::{CommitId, Error, Interrupt, OpContext, Result, VcsClient};

/// Scripted state of one repository.
#[derive(Debug, Clone)]
pub struct FakeRepo {
    pub is_repository: bool,
    pub remote_url: Option<String>,
    pub dirty: bool,
    /// `None` models a detached HEAD.
    pub branch: Option<String>,
    pub local: Option<CommitId>,
    /// Tip of the remote-tracking ref; `None` if the branch was never pushed.
    pub remote: Option<CommitId>,
    /// Merge base reported when local and remote differ.
    pub merge_base: Option<CommitId>,
    /// Remote tips applied on successive fetches; `None` leaves it as is.
    pub fetch_updates: VecDeque<Option<CommitId>>,
    /// Fetch blocks this long (honouring the call's interrupt unless
    /// `ignore_interrupt` is set).
    pub fetch_delay: Option<Duration>,
    /// Fast-forward blocks this long, then applies regardless of timeouts.
    pub fast_forward_delay: Option<Duration>,
    /// Delayed calls keep running after their caller gave up, like a
    /// network call stuck in connect.
    pub ignore_interrupt: bool,
    pub fail_fetch: Option<String>,
    pub fail_push: Option<String>,
    pub fail_fast_forward: Option<String>,
}

impl Default for FakeRepo {
    fn default() -> Self {
        Self {
            is_repository: true,
            remote_url: Some("https://example.com/demo.git".to_string()),
            dirty: false,
            branch: Some("main".to_string()),
            local: None,
            remote: None,
            merge_base: None,
            fetch_updates: VecDeque::new(),
            fetch_delay: None,
            fast_forward_delay: None,
            ignore_interrupt: false,
            fail_fetch: None,
            fail_push: None,
            fail_fast_forward: None,
        }
    }
}

impl FakeRepo {
    /// Clean repository on `main` with the given ref triple.
    pub fn with_refs(local: &str, remote: &str, merge_base: &str) -> Self {
        Self {
            local: Some(CommitId::new(local)),
            remote: Some(CommitId::new(remote)),
            merge_base: Some(CommitId::new(merge_base)),
            ..Self::default()
        }
    }

    pub fn dirty(mut self) -> Self {
        self.dirty = true;
        self
    }
}

/// What a recorded call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    RemoteUrl,
    Fetch,
    IsDirty,
    CurrentBranch,
    LocalRef,
    RemoteRef,
    MergeBase,
    FastForward { target: CommitId },
    Push { branch: String },
}

impl CallKind {
    /// Whether the call changes local refs, the working tree, or the remote.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::FastForward { .. } | Self::Push { .. })
    }
}

/// A recorded call against one repository path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub path: PathBuf,
    pub kind: CallKind,
}

/// In-memory [`VcsClient`].
#[derive(Debug, Default)]
pub struct FakeVcs {
    repos: Arc<Mutex<HashMap<PathBuf, FakeRepo>>>,
    calls: Mutex<Vec<Call>>,
    workers: Arc<WorkerGauge>,
}

/// Counts delayed calls running at once, including abandoned ones.
#[derive(Debug, Default)]
struct WorkerGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl WorkerGauge {
    fn enter(self: &Arc<Self>) -> GaugeGuard {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(Arc::clone(self))
    }
}

struct GaugeGuard(Arc<WorkerGauge>);

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Sleep for `delay`, waking early on interrupt unless `stubborn`.
fn block(delay: Duration, stubborn: bool, interrupt: &Interrupt) {
    if stubborn {
        thread::sleep(delay);
        return;
    }
    let mut waited = Duration::ZERO;
    while waited < delay && !interrupt.should_stop() {
        thread::sleep(Duration::from_millis(5));
        waited += Duration::from_millis(5);
    }
}

fn apply_fast_forward(
    repo: &mut FakeRepo,
    path: &Path,
    branch: &str,
    target: &CommitId,
) -> Result<CommitId> {
    if let Some(message) = &repo.fail_fast_forward {
        return Err(Error::CannotFastForward {
            message: message.clone(),
        });
    }
    if repo.dirty {
        return Err(Error::DirtyWorkingTree {
            path: path.to_path_buf(),
        });
    }
    if repo.branch.as_deref() != Some(branch) {
        return Err(Error::BranchNotFound {
            name: branch.to_string(),
        });
    }
    repo.local = Some(target.clone());
    repo.merge_base = Some(target.clone());
    Ok(target.clone())
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the state observed at `path`.
    pub fn insert(&self, path: impl Into<PathBuf>, repo: FakeRepo) {
        self.repos.lock().unwrap().insert(path.into(), repo);
    }

    /// Current scripted state at `path`.
    pub fn repo(&self, path: &Path) -> FakeRepo {
        self.repos
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_else(|| panic!("no fake repository at {}", path.display()))
    }

    /// Mutate the scripted state in place, e.g. to simulate a remote push.
    pub fn update(&self, path: &Path, f: impl FnOnce(&mut FakeRepo)) {
        let mut repos = self.repos.lock().unwrap();
        let repo = repos
            .get_mut(path)
            .unwrap_or_else(|| panic!("no fake repository at {}", path.display()));
        f(repo);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, path: &Path) -> Vec<CallKind> {
        self.calls()
            .into_iter()
            .filter(|c| c.path == path)
            .map(|c| c.kind)
            .collect()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.kind.is_mutating())
            .collect()
    }

    /// Most delayed calls that were ever running at the same time.
    pub fn peak_workers(&self) -> usize {
        self.workers.peak.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, path: &Path, kind: CallKind) {
        self.calls.lock().unwrap().push(Call {
            path: path.to_path_buf(),
            kind,
        });
    }

    fn with_repo<T>(&self, path: &Path, f: impl FnOnce(&mut FakeRepo) -> Result<T>) -> Result<T> {
        let mut repos = self.repos.lock().unwrap();
        match repos.get_mut(path) {
            Some(repo) => f(repo),
            None => Err(Error::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no fake repository"),
            )),
        }
    }
}

impl VcsClient for FakeVcs {
    fn is_repository(&self, path: &Path) -> bool {
        self.repos
            .lock()
            .unwrap()
            .get(path)
            .is_some_and(|r| r.is_repository)
    }

    fn remote_url(&self, path: &Path, _remote: &str, ctx: &OpContext) -> Result<Option<String>> {
        ctx.check("remote-url")?;
        self.record(path, CallKind::RemoteUrl);
        self.with_repo(path, |r| Ok(r.remote_url.clone()))
    }

    fn fetch(&self, path: &Path, remote: &str, ctx: &OpContext) -> Result<()> {
        self.record(path, CallKind::Fetch);
        let (delay, stubborn, failure) = self.with_repo(path, |r| {
            Ok((r.fetch_delay, r.ignore_interrupt, r.fail_fetch.clone()))
        })?;

        if let Some(delay) = delay {
            let workers = Arc::clone(&self.workers);
            ctx.run("fetch", move |interrupt| {
                let _running = workers.enter();
                block(delay, stubborn, interrupt);
                Ok(())
            })?;
        } else {
            ctx.check("fetch")?;
        }

        if let Some(message) = failure {
            return Err(Error::io(
                path,
                std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    format!("fetch from {remote} failed: {message}"),
                ),
            ));
        }

        self.with_repo(path, |r| {
            if let Some(Some(tip)) = r.fetch_updates.pop_front() {
                r.remote = Some(tip);
            }
            Ok(())
        })
    }

    fn is_dirty(&self, path: &Path, ctx: &OpContext) -> Result<bool> {
        ctx.check("status")?;
        self.record(path, CallKind::IsDirty);
        self.with_repo(path, |r| Ok(r.dirty))
    }

    fn current_branch(&self, path: &Path, ctx: &OpContext) -> Result<Option<String>> {
        ctx.check("current-branch")?;
        self.record(path, CallKind::CurrentBranch);
        self.with_repo(path, |r| Ok(r.branch.clone()))
    }

    fn local_ref(&self, path: &Path, _branch: &str, ctx: &OpContext) -> Result<Option<CommitId>> {
        ctx.check("local-ref")?;
        self.record(path, CallKind::LocalRef);
        self.with_repo(path, |r| Ok(r.local.clone()))
    }

    fn remote_ref(
        &self,
        path: &Path,
        _remote: &str,
        _branch: &str,
        ctx: &OpContext,
    ) -> Result<Option<CommitId>> {
        ctx.check("remote-ref")?;
        self.record(path, CallKind::RemoteRef);
        self.with_repo(path, |r| Ok(r.remote.clone()))
    }

    fn merge_base(
        &self,
        path: &Path,
        a: &CommitId,
        b: &CommitId,
        ctx: &OpContext,
    ) -> Result<Option<CommitId>> {
        ctx.check("merge-base")?;
        self.record(path, CallKind::MergeBase);
        if a == b {
            return Ok(Some(a.clone()));
        }
        self.with_repo(path, |r| Ok(r.merge_base.clone()))
    }

    fn fast_forward(
        &self,
        path: &Path,
        branch: &str,
        target: &CommitId,
        ctx: &OpContext,
    ) -> Result<CommitId> {
        ctx.check("fast-forward")?;
        self.record(
            path,
            CallKind::FastForward {
                target: target.clone(),
            },
        );
        let (delay, stubborn) =
            self.with_repo(path, |r| Ok((r.fast_forward_delay, r.ignore_interrupt)))?;

        let Some(delay) = delay else {
            return self.with_repo(path, |r| apply_fast_forward(r, path, branch, target));
        };

        let repos = Arc::clone(&self.repos);
        let workers = Arc::clone(&self.workers);
        let (path, branch, target) = (path.to_path_buf(), branch.to_string(), target.clone());
        ctx.run("fast-forward", move |interrupt| {
            let _running = workers.enter();
            block(delay, stubborn, interrupt);
            if !stubborn {
                interrupt.check("fast-forward")?;
            }
            let mut repos = repos.lock().unwrap();
            let repo = repos
                .get_mut(&path)
                .unwrap_or_else(|| panic!("no fake repository at {}", path.display()));
            apply_fast_forward(repo, &path, &branch, &target)
        })
    }

    fn push(&self, path: &Path, _remote: &str, branch: &str, ctx: &OpContext) -> Result<()> {
        ctx.check("push")?;
        self.record(
            path,
            CallKind::Push {
                branch: branch.to_string(),
            },
        );
        self.with_repo(path, |r| {
            if let Some(message) = &r.fail_push {
                return Err(Error::PushRejected {
                    refname: format!("refs/heads/{branch}"),
                    message: message.clone(),
                });
            }
            r.remote = r.local.clone();
            r.merge_base = r.local.clone();
            Ok(())
        })
    }
}
