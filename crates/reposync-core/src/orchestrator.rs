//! Pass Orchestrator
//!
//! Drives one full pass: every descriptor goes through
//! Inspector -> Decision Engine -> Executor on a bounded pool of worker
//! threads. A failure in one repository becomes that repository's `error`
//! result and never stops the others. Results are reported in configured
//! order whatever order the workers finish in.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use reposync_git::{CancellationToken, OpContext, VcsClient};

use crate::Result;
use crate::config::{EngineSettings, Policy, RepositoryDescriptor, RunOverrides};
use crate::decision::decide;
use crate::executor::Executor;
use crate::inspector::Inspector;
use crate::lock::{PassGuard, PathLocks};
use crate::model::{Inspection, PlannedAction, RepositoryState, SyncResult, SyncStatus};
use crate::sink::{EventLevel, LogEvent, OutcomeSink};
use crate::summary::RunSummary;

/// Engine tuning for a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Worker threads; clamped to at least one
    pub workers: usize,
    /// Bound on each version-control call
    pub timeout: Duration,
    pub default_remote: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&EngineSettings::default())
    }
}

impl From<&EngineSettings> for EngineOptions {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            workers: settings.workers,
            timeout: settings.timeout(),
            default_remote: settings.default_remote.clone(),
        }
    }
}

/// Classification of one repository without execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub name: String,
    pub state: RepositoryState,
    /// The planned action, or the operational error that prevented
    /// classification
    pub planned: std::result::Result<PlannedAction, String>,
}

impl PlanEntry {
    pub fn status(&self) -> SyncStatus {
        match &self.planned {
            Ok(action) => action.status(),
            Err(_) => SyncStatus::Error,
        }
    }

    pub fn describe(&self) -> String {
        match &self.planned {
            Ok(action) => action.to_string(),
            Err(message) => message.clone(),
        }
    }
}

/// Runs reconciliation passes over a descriptor set.
pub struct Orchestrator {
    client: Arc<dyn VcsClient>,
    sink: Arc<dyn OutcomeSink>,
    options: EngineOptions,
    in_flight: AtomicBool,
    path_locks: PathLocks,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn VcsClient>,
        sink: Arc<dyn OutcomeSink>,
        options: EngineOptions,
    ) -> Self {
        Self {
            client,
            sink,
            options,
            in_flight: AtomicBool::new(false),
            path_locks: PathLocks::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts outstanding version-control calls when cancelled.
    ///
    /// Cancelling stops the pass in flight, or the next pass if none is
    /// running. The token is cleared when that pass ends.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run one pass and return its summary.
    ///
    /// # Errors
    ///
    /// Returns `PassInFlight` if a pass is already running on this
    /// orchestrator. Per-repository failures are never errors here.
    pub fn run(
        &self,
        descriptors: &[RepositoryDescriptor],
        policy: &Policy,
        overrides: RunOverrides,
    ) -> Result<RunSummary> {
        self.run_with_results(descriptors, policy, overrides)
            .map(|(summary, _)| summary)
    }

    /// Run one pass and return the summary plus every result in
    /// configured order.
    ///
    /// # Errors
    ///
    /// Returns `PassInFlight` if a pass is already running on this
    /// orchestrator.
    pub fn run_with_results(
        &self,
        descriptors: &[RepositoryDescriptor],
        policy: &Policy,
        overrides: RunOverrides,
    ) -> Result<(RunSummary, Vec<SyncResult>)> {
        let _guard = PassGuard::acquire(&self.in_flight)?;
        let policy = policy.clone().with_overrides(overrides);
        let started_at = Utc::now();

        tracing::info!(
            repositories = descriptors.len(),
            workers = self.worker_count(descriptors.len()),
            dry_run = policy.dry_run,
            "Starting reconciliation pass"
        );
        if policy.auto_stash {
            self.emit(&LogEvent::new(
                EventLevel::Warning,
                "auto_stash is set but dirty trees are never stashed; they are fetched only",
            ));
        }

        let results = self.for_each_repository(descriptors, |descriptor| {
            self.reconcile(descriptor, &policy)
        });
        let results: Vec<SyncResult> = results
            .into_iter()
            .zip(descriptors)
            .map(|(outcome, descriptor)| {
                outcome.unwrap_or_else(|message| SyncResult::error(&descriptor.name, message))
            })
            .collect();

        for result in &results {
            if overrides.verbose || !is_quiet(result.status) {
                self.emit(&LogEvent::for_result(result));
            }
        }

        let summary = RunSummary::from_results(&results, started_at, policy.dry_run);
        if let Err(e) = self.sink.finish(&summary, &results) {
            tracing::error!(error = %e, "Failed to record pass summary");
        }
        tracing::info!(run_id = %summary.run_id, "Pass finished: {summary}");
        self.cancel.reset();

        Ok((summary, results))
    }

    /// Inspect and classify every repository without executing anything.
    ///
    /// Inspection still fetches, so remote-tracking refs are refreshed.
    ///
    /// # Errors
    ///
    /// Returns `PassInFlight` if a pass is already running on this
    /// orchestrator.
    pub fn plan(
        &self,
        descriptors: &[RepositoryDescriptor],
        policy: &Policy,
    ) -> Result<Vec<PlanEntry>> {
        let _guard = PassGuard::acquire(&self.in_flight)?;

        let entries = self.for_each_repository(descriptors, |descriptor| {
            let (state, planned) = match self.inspect(descriptor) {
                Ok(inspection) => {
                    let action = decide(&inspection, policy);
                    (inspection.state, Ok(action))
                }
                Err(message) => (RepositoryState::default(), Err(message)),
            };
            PlanEntry {
                name: descriptor.name.clone(),
                state,
                planned,
            }
        });

        self.cancel.reset();

        Ok(entries
            .into_iter()
            .zip(descriptors)
            .map(|(entry, descriptor)| {
                entry.unwrap_or_else(|message| PlanEntry {
                    name: descriptor.name.clone(),
                    state: RepositoryState::default(),
                    planned: Err(message),
                })
            })
            .collect())
    }

    fn reconcile(&self, descriptor: &RepositoryDescriptor, policy: &Policy) -> SyncResult {
        let ctx = self.context();
        let executor = Executor::new(self.client.as_ref(), &ctx, &self.options.default_remote);

        if !descriptor.enabled {
            let inspection = Inspection::disabled();
            let action = decide(&inspection, policy);
            return executor.execute(descriptor, &inspection.state, &action);
        }

        let _lease = self.path_locks.lock(&descriptor.path);
        let _settle = Settle(&ctx);
        let inspection = match self.inspect_with(descriptor, &ctx) {
            Ok(inspection) => inspection,
            Err(message) => return SyncResult::error(&descriptor.name, message),
        };

        let action = decide(&inspection, policy);
        tracing::debug!(repo = %descriptor.name, %action, "Planned");
        executor.execute(descriptor, &inspection.state, &action)
    }

    fn inspect(&self, descriptor: &RepositoryDescriptor) -> std::result::Result<Inspection, String> {
        if !descriptor.enabled {
            return Ok(Inspection::disabled());
        }
        let ctx = self.context();
        let _lease = self.path_locks.lock(&descriptor.path);
        let _settle = Settle(&ctx);
        self.inspect_with(descriptor, &ctx)
    }

    fn inspect_with(
        &self,
        descriptor: &RepositoryDescriptor,
        ctx: &OpContext,
    ) -> std::result::Result<Inspection, String> {
        Inspector::new(self.client.as_ref(), ctx, &self.options.default_remote)
            .inspect(descriptor)
            .map_err(|e| e.to_string())
    }

    fn context(&self) -> OpContext {
        OpContext::new(self.options.timeout).with_cancellation(self.cancel.clone())
    }

    fn emit(&self, event: &LogEvent) {
        if let Err(e) = self.sink.record(event) {
            tracing::error!(error = %e, "Failed to record outcome event");
        }
    }

    fn worker_count(&self, jobs: usize) -> usize {
        self.options.workers.max(1).min(jobs.max(1))
    }

    /// Apply `work` to every descriptor on the worker pool. Output slot `i`
    /// belongs to descriptor `i`; a panicking job yields `Err(message)`.
    fn for_each_repository<T, F>(
        &self,
        descriptors: &[RepositoryDescriptor],
        work: F,
    ) -> Vec<std::result::Result<T, String>>
    where
        T: Send,
        F: Fn(&RepositoryDescriptor) -> T + Sync,
    {
        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            for worker in 0..self.worker_count(descriptors.len()) {
                let tx = tx.clone();
                let next = &next;
                let work = &work;
                let spawned = thread::Builder::new()
                    .name(format!("reposync-worker-{worker}"))
                    .spawn_scoped(scope, move || {
                        loop {
                            let index = next.fetch_add(1, Ordering::SeqCst);
                            let Some(descriptor) = descriptors.get(index) else {
                                break;
                            };
                            let outcome =
                                panic::catch_unwind(AssertUnwindSafe(|| work(descriptor)))
                                    .map_err(|payload| {
                                        let message = panic_message(payload.as_ref());
                                        tracing::error!(
                                            repo = %descriptor.name,
                                            %message,
                                            "Worker panicked"
                                        );
                                        format!("internal failure: {message}")
                                    });
                            if tx.send((index, outcome)).is_err() {
                                break;
                            }
                        }
                    });
                if let Err(e) = spawned {
                    tracing::error!(error = %e, "Failed to spawn worker thread");
                }
            }
        });
        drop(tx);

        let mut slots: Vec<Option<std::result::Result<T, String>>> =
            (0..descriptors.len()).map(|_| None).collect();
        for (index, outcome) in rx {
            slots[index] = Some(outcome);
        }
        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err("no worker available to process repository".into()))
            })
            .collect()
    }
}

/// Keeps a repository's path lease alive until every worker started for
/// it has exited, including calls abandoned after a timeout. Declared after
/// the lease so it drops first.
struct Settle<'a>(&'a OpContext);

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        self.0.wait_for_workers();
    }
}

/// Results that only reach the sink in verbose mode.
fn is_quiet(status: SyncStatus) -> bool {
    matches!(status, SyncStatus::UpToDate | SyncStatus::SkippedDisabled)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
