//! End-to-end reconciliation against real repositories
//!
//! Each test builds a bare remote plus clones with the git CLI, then runs
//! full passes through the libgit2 client: inspect, decide, execute,
//! report.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use reposync_core::{
    EngineOptions, JsonlSink, MemorySink, Orchestrator, OutcomeSink, Policy,
    RepositoryDescriptor, RunOverrides, SyncResult, SyncStatus,
};
use reposync_git::Git2Client;
use reposync_test_utils::GitFixture;
use reposync_test_utils::git::{commit_file, git, rev_parse};

fn orchestrator(sink: Arc<dyn OutcomeSink>) -> Orchestrator {
    Orchestrator::new(Arc::new(Git2Client::new()), sink, EngineOptions::default())
}

fn pass(repos: &[RepositoryDescriptor], policy: &Policy) -> Vec<SyncResult> {
    pass_with(repos, policy, RunOverrides::default())
}

fn pass_with(
    repos: &[RepositoryDescriptor],
    policy: &Policy,
    overrides: RunOverrides,
) -> Vec<SyncResult> {
    let (_, results) = orchestrator(Arc::new(MemorySink::new()))
        .run_with_results(repos, policy, overrides)
        .unwrap();
    results
}

fn descriptor(name: &str, path: &Path) -> Vec<RepositoryDescriptor> {
    vec![RepositoryDescriptor::new(name, path)]
}

fn auto_push() -> Policy {
    Policy {
        auto_push: true,
        ..Policy::default()
    }
}

#[test]
fn test_scenario_a_fresh_clone_is_up_to_date() {
    let fixture = GitFixture::new();
    let clone = fixture.clone_repo("demo");

    let results = pass(&descriptor("demo", &clone), &Policy::default());

    assert_eq!(results[0].status, SyncStatus::UpToDate);
}

#[test]
fn test_scenario_b_behind_clone_is_fast_forwarded() {
    let fixture = GitFixture::new();
    let clone = fixture.clone_repo("demo");
    let upstream = fixture.push_from_elsewhere("remote.txt", "from elsewhere");

    let results = pass(&descriptor("demo", &clone), &Policy::default());

    assert_eq!(results[0].status, SyncStatus::Pulled);
    assert_eq!(rev_parse(&clone, "HEAD"), upstream);
    assert_eq!(
        fs::read_to_string(clone.join("remote.txt")).unwrap(),
        "from elsewhere"
    );
    // No merge commit: HEAD is exactly the remote tip
    assert_eq!(rev_parse(&clone, "HEAD"), rev_parse(&clone, "origin/main"));
}

#[test]
fn test_scenario_c_ahead_clone_is_not_pushed_by_default() {
    let fixture = GitFixture::new();
    let clone = fixture.clone_repo("demo");
    let remote_before = fixture.remote_tip("main");
    commit_file(&clone, "local.txt", "local work");

    let results = pass(&descriptor("demo", &clone), &Policy::default());

    assert_eq!(results[0].status, SyncStatus::Ahead);
    assert_eq!(fixture.remote_tip("main"), remote_before);
}

#[test]
fn test_ahead_clone_is_pushed_with_auto_push() {
    let fixture = GitFixture::new();
    let clone = fixture.clone_repo("demo");
    let local = commit_file(&clone, "local.txt", "local work");

    let results = pass(&descriptor("demo", &clone), &auto_push());

    assert_eq!(results[0].status, SyncStatus::Pushed);
    assert_eq!(fixture.remote_tip("main"), local);
}

#[test]
fn test_scenario_d_dirty_clone_is_only_fetched() {
    let fixture = GitFixture::new();
    let clone = fixture.clone_repo("demo");
    let local_before = rev_parse(&clone, "HEAD");
    let upstream = fixture.push_from_elsewhere("remote.txt", "from elsewhere");
    fs::write(clone.join("README.md"), "# Uncommitted edit").unwrap();

    let results = pass(&descriptor("demo", &clone), &auto_push());

    assert_eq!(results[0].status, SyncStatus::Dirty);
    assert_eq!(rev_parse(&clone, "HEAD"), local_before);
    // The fetch still refreshed the remote-tracking ref
    assert_eq!(rev_parse(&clone, "origin/main"), upstream);
    assert_eq!(
        fs::read_to_string(clone.join("README.md")).unwrap(),
        "# Uncommitted edit"
    );
}

#[test]
fn test_scenario_e_diverged_clone_is_left_alone() {
    let fixture = GitFixture::new();
    let clone = fixture.clone_repo("demo");
    let upstream = fixture.push_from_elsewhere("remote.txt", "from elsewhere");
    let local = commit_file(&clone, "local.txt", "local work");

    let results = pass(&descriptor("demo", &clone), &auto_push());

    assert_eq!(results[0].status, SyncStatus::Diverged);
    assert_eq!(rev_parse(&clone, "HEAD"), local);
    assert_eq!(fixture.remote_tip("main"), upstream);
}

#[test]
fn test_second_pass_is_idempotent() {
    let fixture = GitFixture::new();
    let behind = fixture.clone_repo("behind");
    let ahead = fixture.clone_repo("ahead");
    fixture.push_from_elsewhere("remote.txt", "from elsewhere");
    git(&ahead, &["pull", "--ff-only", "origin", "main"]);
    commit_file(&ahead, "local.txt", "local work");

    let repos = vec![
        RepositoryDescriptor::new("behind", &behind),
        RepositoryDescriptor::new("ahead", &ahead),
    ];

    let first = pass(&repos, &auto_push());
    assert_eq!(first[0].status, SyncStatus::Pulled);
    assert_eq!(first[1].status, SyncStatus::Pushed);

    // "behind" is now one commit behind what "ahead" pushed
    let second = pass(&repos, &auto_push());
    assert_eq!(second[0].status, SyncStatus::Pulled);
    assert_eq!(second[1].status, SyncStatus::UpToDate);

    let third = pass(&repos, &auto_push());
    assert_eq!(third[0].status, SyncStatus::UpToDate);
    assert_eq!(third[1].status, SyncStatus::UpToDate);
}

#[test]
fn test_dry_run_changes_nothing() {
    let fixture = GitFixture::new();
    let behind = fixture.clone_repo("behind");
    let ahead = fixture.clone_repo("ahead");
    let behind_before = rev_parse(&behind, "HEAD");
    fixture.push_from_elsewhere("remote.txt", "from elsewhere");
    git(&ahead, &["pull", "--ff-only", "origin", "main"]);
    commit_file(&ahead, "local.txt", "local work");
    let remote_before = fixture.remote_tip("main");

    let repos = vec![
        RepositoryDescriptor::new("behind", &behind),
        RepositoryDescriptor::new("ahead", &ahead),
    ];
    let results = pass_with(
        &repos,
        &auto_push(),
        RunOverrides {
            dry_run: true,
            ..RunOverrides::default()
        },
    );

    assert_eq!(results[0].status, SyncStatus::DryRun);
    assert_eq!(results[1].status, SyncStatus::DryRun);
    assert_eq!(rev_parse(&behind, "HEAD"), behind_before);
    assert_eq!(fixture.remote_tip("main"), remote_before);
}

#[test]
fn test_new_branch_is_published_only_with_push_allowed() {
    let fixture = GitFixture::new();
    let clone = fixture.clone_repo("demo");
    git(&clone, &["checkout", "-b", "feature"]);
    let local = commit_file(&clone, "feature.txt", "feature work");

    let results = pass(&descriptor("demo", &clone), &Policy::default());
    assert_eq!(results[0].status, SyncStatus::Ahead);

    let results = pass(&descriptor("demo", &clone), &auto_push());
    assert_eq!(results[0].status, SyncStatus::Pushed);
    assert_eq!(fixture.remote_tip("feature"), local);
}

#[test]
fn test_detached_and_non_repository_paths_are_skipped() {
    let fixture = GitFixture::new();
    let detached = fixture.clone_repo("detached");
    let head = rev_parse(&detached, "HEAD");
    git(&detached, &["checkout", "--detach", &head]);
    let plain = fixture.root().join("plain");
    fs::create_dir(&plain).unwrap();
    let orphan = fixture.root().join("orphan");
    fs::create_dir(&orphan).unwrap();
    git(&orphan, &["init"]);

    let repos = vec![
        RepositoryDescriptor::new("detached", &detached),
        RepositoryDescriptor::new("plain", &plain),
        RepositoryDescriptor::new("orphan", &orphan),
        RepositoryDescriptor::new("missing", fixture.root().join("missing")),
    ];
    let results = pass(&repos, &auto_push());
    let statuses: Vec<SyncStatus> = results.iter().map(|r| r.status).collect();

    assert_eq!(
        statuses,
        vec![
            SyncStatus::SkippedDetached,
            SyncStatus::SkippedNotRepo,
            SyncStatus::SkippedNoRemote,
            SyncStatus::SkippedNoPath,
        ]
    );
}

#[test]
fn test_unreachable_remote_is_error_and_pass_continues() {
    let fixture = GitFixture::new();
    let broken = fixture.clone_repo("broken");
    git(
        &broken,
        &["remote", "set-url", "origin", "/nonexistent/remote.git"],
    );
    let healthy = fixture.clone_repo("healthy");
    fixture.push_from_elsewhere("remote.txt", "from elsewhere");

    let repos = vec![
        RepositoryDescriptor::new("broken", &broken),
        RepositoryDescriptor::new("healthy", &healthy),
    ];
    let results = pass(&repos, &Policy::default());

    assert_eq!(results[0].status, SyncStatus::Error);
    assert_eq!(results[1].status, SyncStatus::Pulled);
}

#[test]
fn test_outcome_log_records_the_pass() {
    let fixture = GitFixture::new();
    let clone = fixture.clone_repo("demo");
    fixture.push_from_elsewhere("remote.txt", "from elsewhere");
    let log_path = fixture.root().join("reposync.jsonl");

    let summary = orchestrator(Arc::new(JsonlSink::open(&log_path).unwrap()))
        .run(&descriptor("demo", &clone), &Policy::default(), RunOverrides::default())
        .unwrap();
    assert_eq!(summary.pulled, 1);

    let content = fs::read_to_string(&log_path).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["status"], "pulled");
    assert_eq!(lines[1]["summary"]["run_id"], summary.run_id.to_string());
}
