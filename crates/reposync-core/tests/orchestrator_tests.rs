//! Pass orchestration against the scripted client

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use reposync_core::{
    EngineOptions, Error, EventLevel, MemorySink, Orchestrator, Policy, RepositoryDescriptor,
    RunOverrides, SyncResult, SyncStatus,
};
use reposync_git::CommitId;
use reposync_test_utils::fake::{CallKind, FakeRepo, FakeVcs};
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
    fake: Arc<FakeVcs>,
    sink: Arc<MemorySink>,
    orchestrator: Orchestrator,
}

impl Harness {
    fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    fn with_options(options: EngineOptions) -> Self {
        let fake = Arc::new(FakeVcs::new());
        let sink = Arc::new(MemorySink::new());
        let orchestrator = Orchestrator::new(fake.clone(), sink.clone(), options);
        Self {
            dir: TempDir::new().unwrap(),
            fake,
            sink,
            orchestrator,
        }
    }

    /// Create a working-copy directory scripted with `repo`.
    fn add(&self, name: &str, repo: FakeRepo) -> RepositoryDescriptor {
        let path = self.path(name);
        std::fs::create_dir_all(&path).unwrap();
        self.fake.insert(&path, repo);
        RepositoryDescriptor::new(name, path)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn run(&self, descriptors: &[RepositoryDescriptor], policy: &Policy) -> Vec<SyncResult> {
        self.run_with(descriptors, policy, RunOverrides::default())
    }

    fn run_with(
        &self,
        descriptors: &[RepositoryDescriptor],
        policy: &Policy,
        overrides: RunOverrides,
    ) -> Vec<SyncResult> {
        let (_, results) = self
            .orchestrator
            .run_with_results(descriptors, policy, overrides)
            .unwrap();
        results
    }
}

fn auto_push() -> Policy {
    Policy {
        auto_push: true,
        ..Policy::default()
    }
}

fn statuses(results: &[SyncResult]) -> Vec<SyncStatus> {
    results.iter().map(|r| r.status).collect()
}

fn fetch_count(fake: &FakeVcs, path: &Path) -> usize {
    fake.calls_for(path)
        .iter()
        .filter(|k| **k == CallKind::Fetch)
        .count()
}

#[test]
fn scenario_a_same_tip_is_up_to_date() {
    let h = Harness::new();
    let demo = h.add("demo", FakeRepo::with_refs("aaa", "aaa", "aaa"));

    let results = h.run(&[demo], &Policy::default());

    assert_eq!(statuses(&results), vec![SyncStatus::UpToDate]);
    assert!(h.fake.mutating_calls().is_empty());
}

#[test]
fn scenario_b_behind_is_fast_forwarded() {
    let h = Harness::new();
    let demo = h.add("demo", FakeRepo::with_refs("aaa", "bbb", "aaa"));

    let results = h.run(&[demo], &Policy::default());

    assert_eq!(statuses(&results), vec![SyncStatus::Pulled]);
    assert_eq!(h.fake.repo(&h.path("demo")).local, Some(CommitId::new("bbb")));
}

#[test]
fn scenario_c_ahead_without_auto_push_is_reported() {
    let h = Harness::new();
    let demo = h.add("demo", FakeRepo::with_refs("ccc", "aaa", "aaa"));

    let results = h.run(&[demo], &Policy::default());

    assert_eq!(statuses(&results), vec![SyncStatus::Ahead]);
    assert!(h.fake.mutating_calls().is_empty());
    assert_eq!(h.fake.repo(&h.path("demo")).remote, Some(CommitId::new("aaa")));
}

#[test]
fn scenario_d_dirty_tree_is_only_fetched() {
    let h = Harness::new();
    let demo = h.add("demo", FakeRepo::with_refs("aaa", "bbb", "aaa").dirty());

    let results = h.run(&[demo], &auto_push());

    assert_eq!(statuses(&results), vec![SyncStatus::Dirty]);
    assert_eq!(fetch_count(&h.fake, &h.path("demo")), 1);
    assert!(h.fake.mutating_calls().is_empty());
    assert_eq!(h.fake.repo(&h.path("demo")).local, Some(CommitId::new("aaa")));
}

#[test]
fn scenario_e_independent_histories_are_diverged() {
    let h = Harness::new();
    let demo = h.add("demo", FakeRepo::with_refs("aaa", "bbb", "ddd"));

    let summary = h
        .orchestrator
        .run(&[demo], &auto_push(), RunOverrides::default())
        .unwrap();

    assert_eq!(summary.diverged, 1);
    assert_eq!(summary.attention[0].status, SyncStatus::Diverged);
    assert!(h.fake.mutating_calls().is_empty());
}

#[test]
fn second_pass_without_changes_is_idempotent() {
    let h = Harness::new();
    let repos = vec![
        h.add("behind", FakeRepo::with_refs("aaa", "bbb", "aaa")),
        h.add("ahead", FakeRepo::with_refs("ccc", "aaa", "aaa")),
        h.add("current", FakeRepo::with_refs("aaa", "aaa", "aaa")),
    ];

    let first = h.run(&repos, &auto_push());
    assert_eq!(
        statuses(&first),
        vec![SyncStatus::Pulled, SyncStatus::Pushed, SyncStatus::UpToDate]
    );

    h.fake.clear_calls();
    let second = h.run(&repos, &auto_push());

    assert_eq!(statuses(&second), vec![SyncStatus::UpToDate; 3]);
    assert!(h.fake.mutating_calls().is_empty());
}

#[test]
fn dry_run_classifies_without_mutating() {
    let h = Harness::new();
    let repos = vec![
        h.add("behind", FakeRepo::with_refs("aaa", "bbb", "aaa")),
        h.add("ahead", FakeRepo::with_refs("ccc", "aaa", "aaa")),
        h.add("new", FakeRepo {
            local: Some(CommitId::new("ccc")),
            ..FakeRepo::default()
        }),
        h.add("current", FakeRepo::with_refs("aaa", "aaa", "aaa")),
        h.add("diverged", FakeRepo::with_refs("aaa", "bbb", "ddd")),
    ];

    let results = h.run_with(
        &repos,
        &auto_push(),
        RunOverrides {
            dry_run: true,
            ..RunOverrides::default()
        },
    );

    assert_eq!(
        statuses(&results),
        vec![
            SyncStatus::DryRun,
            SyncStatus::DryRun,
            SyncStatus::DryRun,
            SyncStatus::UpToDate,
            SyncStatus::Diverged,
        ]
    );
    assert_eq!(results[0].reason, "would fast-forward 'main'");
    assert!(h.fake.mutating_calls().is_empty());
}

#[test]
fn one_failure_does_not_stop_the_pass() {
    let h = Harness::new();
    let repos = vec![
        h.add("broken", FakeRepo {
            fail_fetch: Some("network unreachable".into()),
            ..FakeRepo::with_refs("aaa", "bbb", "aaa")
        }),
        h.add("healthy", FakeRepo::with_refs("aaa", "bbb", "aaa")),
    ];

    let (summary, results) = h
        .orchestrator
        .run_with_results(&repos, &Policy::default(), RunOverrides::default())
        .unwrap();

    assert_eq!(statuses(&results), vec![SyncStatus::Error, SyncStatus::Pulled]);
    assert!(results[0].reason.contains("network unreachable"));
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.pulled, 1);
    assert_eq!(summary.total, 2);
}

#[test]
fn unresponsive_remote_times_out_as_error() {
    let h = Harness::with_options(EngineOptions {
        timeout: Duration::from_millis(100),
        ..EngineOptions::default()
    });
    let repos = vec![
        h.add("slow", FakeRepo {
            fetch_delay: Some(Duration::from_secs(10)),
            ..FakeRepo::with_refs("aaa", "aaa", "aaa")
        }),
        h.add("fast", FakeRepo::with_refs("aaa", "aaa", "aaa")),
    ];

    let started = Instant::now();
    let results = h.run(&repos, &Policy::default());

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(statuses(&results), vec![SyncStatus::Error, SyncStatus::UpToDate]);
    assert!(results[0].reason.contains("timed out"));
}

#[test]
fn results_follow_configured_order() {
    let h = Harness::with_options(EngineOptions {
        workers: 4,
        ..EngineOptions::default()
    });
    let repos: Vec<_> = (0..6)
        .map(|i| {
            h.add(&format!("repo-{i}"), FakeRepo {
                // Earlier repositories finish last
                fetch_delay: Some(Duration::from_millis(60 - i * 10)),
                ..FakeRepo::with_refs("aaa", "aaa", "aaa")
            })
        })
        .collect();

    let results = h.run(&repos, &Policy::default());
    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();

    assert_eq!(
        names,
        vec!["repo-0", "repo-1", "repo-2", "repo-3", "repo-4", "repo-5"]
    );
}

#[test]
fn overlapping_pass_is_refused() {
    let h = Arc::new(Harness::new());
    let slow = h.add("slow", FakeRepo {
        fetch_delay: Some(Duration::from_millis(800)),
        ..FakeRepo::with_refs("aaa", "aaa", "aaa")
    });

    let background = {
        let h = Arc::clone(&h);
        let repos = vec![slow.clone()];
        thread::spawn(move || {
            h.orchestrator
                .run(&repos, &Policy::default(), RunOverrides::default())
                .map(|summary| summary.total)
        })
    };

    thread::sleep(Duration::from_millis(200));
    let overlapping = h
        .orchestrator
        .run(&[slow.clone()], &Policy::default(), RunOverrides::default());
    assert!(matches!(overlapping, Err(Error::PassInFlight)));

    assert_eq!(background.join().unwrap().unwrap(), 1);

    // Guard released once the first pass returned
    assert!(
        h.orchestrator
            .run(&[slow], &Policy::default(), RunOverrides::default())
            .is_ok()
    );
}

#[test]
fn disabled_repository_is_never_touched() {
    let h = Harness::new();
    let off = h.add("off", FakeRepo::with_refs("aaa", "bbb", "aaa")).disabled();

    let results = h.run(&[off], &Policy::default());

    assert_eq!(statuses(&results), vec![SyncStatus::SkippedDisabled]);
    assert!(h.fake.calls().is_empty());
    assert!(h.sink.events_for("off").is_empty());
}

#[test]
fn verbose_records_quiet_results() {
    let h = Harness::new();
    let repos = vec![
        h.add("off", FakeRepo::default()).disabled(),
        h.add("current", FakeRepo::with_refs("aaa", "aaa", "aaa")),
    ];

    h.run_with(
        &repos,
        &Policy::default(),
        RunOverrides {
            verbose: true,
            ..RunOverrides::default()
        },
    );

    assert_eq!(h.sink.events_for("off").len(), 1);
    assert_eq!(h.sink.events_for("current").len(), 1);
}

#[test]
fn preconditions_skip_and_warn() {
    let h = Harness::new();
    let repos = vec![
        RepositoryDescriptor::new("missing", h.path("missing")),
        h.add("plain", FakeRepo {
            is_repository: false,
            ..FakeRepo::default()
        }),
        h.add("no-remote", FakeRepo {
            remote_url: None,
            ..FakeRepo::default()
        }),
        h.add("detached", FakeRepo {
            branch: None,
            ..FakeRepo::with_refs("aaa", "aaa", "aaa")
        }),
        h.add("empty", FakeRepo::default()),
    ];

    let (summary, results) = h
        .orchestrator
        .run_with_results(&repos, &Policy::default(), RunOverrides::default())
        .unwrap();

    assert_eq!(
        statuses(&results),
        vec![
            SyncStatus::SkippedNoPath,
            SyncStatus::SkippedNotRepo,
            SyncStatus::SkippedNoRemote,
            SyncStatus::SkippedDetached,
            SyncStatus::SkippedEmpty,
        ]
    );
    assert_eq!(summary.skipped, 5);
    let events = h.sink.events_for("detached");
    assert_eq!(events[0].level, EventLevel::Warning);
    // Detached repositories are still fetched
    assert_eq!(fetch_count(&h.fake, &h.path("detached")), 1);
}

#[test]
fn push_is_withheld_when_remote_moves_during_pass() {
    let h = Harness::new();
    let mut repo = FakeRepo::with_refs("ccc", "aaa", "aaa");
    // Inspection fetch sees nothing new; the pre-push fetch sees "eee"
    repo.fetch_updates = [None, Some(CommitId::new("eee"))].into();
    let demo = h.add("demo", repo);

    let results = h.run(&[demo], &auto_push());

    assert_eq!(statuses(&results), vec![SyncStatus::Error]);
    assert!(results[0].reason.contains("push withheld"));
    assert!(h.fake.mutating_calls().is_empty());
}

#[test]
fn sink_receives_events_and_one_summary() {
    let h = Harness::new();
    let repos = vec![
        h.add("behind", FakeRepo::with_refs("aaa", "bbb", "aaa")),
        h.add("current", FakeRepo::with_refs("aaa", "aaa", "aaa")),
    ];

    h.run(&repos, &Policy::default());

    assert_eq!(h.sink.events_for("behind").len(), 1);
    assert!(h.sink.events_for("current").is_empty());
    let summaries = h.sink.summaries();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].total, 2);
    assert_eq!(summaries[0].up_to_date, 1);
}

#[test]
fn auto_stash_logs_a_warning_and_never_stashes() {
    let h = Harness::new();
    let demo = h.add("demo", FakeRepo::with_refs("aaa", "bbb", "aaa").dirty());
    let policy = Policy {
        auto_stash: true,
        ..Policy::default()
    };

    let results = h.run(&[demo], &policy);

    assert_eq!(statuses(&results), vec![SyncStatus::Dirty]);
    let warnings: Vec<_> = h
        .sink
        .events()
        .into_iter()
        .filter(|e| e.repository.is_none() && e.level == EventLevel::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("auto_stash"));
}

#[test]
fn plan_classifies_without_executing() {
    let h = Harness::new();
    let repos = vec![
        h.add("behind", FakeRepo::with_refs("aaa", "bbb", "aaa")),
        h.add("broken", FakeRepo {
            fail_fetch: Some("connection reset".into()),
            ..FakeRepo::default()
        }),
    ];

    let plan = h.orchestrator.plan(&repos, &auto_push()).unwrap();

    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0].status(), SyncStatus::Pulled);
    assert_eq!(plan[0].describe(), "fast-forward 'main'");
    assert_eq!(plan[1].status(), SyncStatus::Error);
    assert!(h.fake.mutating_calls().is_empty());
    assert!(h.sink.summaries().is_empty());
}

#[test]
fn cancellation_turns_remaining_work_into_errors() {
    let h = Harness::new();
    let demo = h.add("demo", FakeRepo::with_refs("aaa", "bbb", "aaa"));
    h.orchestrator.cancellation().cancel();

    let results = h.run(&[demo], &Policy::default());

    assert_eq!(statuses(&results), vec![SyncStatus::Error]);
    assert!(results[0].reason.contains("cancelled"));
    assert!(h.fake.mutating_calls().is_empty());
}

#[test]
fn abandoned_call_keeps_its_path_exclusive() {
    let h = Harness::with_options(EngineOptions {
        timeout: Duration::from_millis(50),
        ..EngineOptions::default()
    });
    // The fetch ignores its interrupt and outlives the timeout.
    let demo = h.add("demo", FakeRepo {
        fetch_delay: Some(Duration::from_millis(300)),
        ignore_interrupt: true,
        ..FakeRepo::with_refs("aaa", "aaa", "aaa")
    });
    let repos = vec![demo];

    let first = h.run(&repos, &Policy::default());
    let second = h.run(&repos, &Policy::default());

    assert_eq!(statuses(&first), vec![SyncStatus::Error]);
    assert_eq!(statuses(&second), vec![SyncStatus::Error]);
    assert_eq!(h.fake.peak_workers(), 1);
}

#[test]
fn cancellation_ends_with_its_pass() {
    let h = Harness::new();
    let demo = h.add("demo", FakeRepo::with_refs("aaa", "bbb", "aaa"));
    let repos = vec![demo];
    h.orchestrator.cancellation().cancel();

    let cancelled = h.run(&repos, &Policy::default());
    let next = h.run(&repos, &Policy::default());

    assert_eq!(statuses(&cancelled), vec![SyncStatus::Error]);
    assert_eq!(statuses(&next), vec![SyncStatus::Pulled]);
    assert!(!h.orchestrator.cancellation().is_cancelled());
}
