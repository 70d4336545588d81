//! Descriptor store loading and validation

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use pretty_assertions::assert_eq;
use reposync_core::{
    ConfigStore, EngineOptions, Error, PullStrategy, RepositoryDescriptor, SyncConfig, load_config,
};
use rstest::rstest;
use tempfile::tempdir;

const FULL_TOML: &str = r#"
[policy]
pull_strategy = "ff-only"
auto_stash = false
auto_push = true

[engine]
workers = 8
timeout_secs = 15
default_remote = "upstream"
log_file = "/var/log/reposync.jsonl"

[[repositories]]
name = "demo"
path = "/srv/demo"

[[repositories]]
name = "archive"
path = "/srv/archive"
enabled = false
remote = "backup"
"#;

#[test]
fn test_load_full_toml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, FULL_TOML).unwrap();

    let config = load_config(&path).unwrap();

    assert_eq!(config.policy.pull_strategy, PullStrategy::FfOnly);
    assert!(config.policy.auto_push);
    assert!(!config.policy.dry_run);
    assert_eq!(config.engine.workers, 8);
    assert_eq!(config.engine.timeout(), Duration::from_secs(15));
    assert_eq!(
        config.engine.log_file,
        Some(PathBuf::from("/var/log/reposync.jsonl"))
    );
    assert_eq!(
        config.repositories,
        vec![
            RepositoryDescriptor::new("demo", "/srv/demo"),
            RepositoryDescriptor::new("archive", "/srv/archive")
                .disabled()
                .with_remote("backup"),
        ]
    );
}

#[test]
fn test_minimal_config_uses_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[[repositories]]\nname = \"demo\"\npath = \"/srv/demo\"\n").unwrap();

    let config = load_config(&path).unwrap();
    let options = EngineOptions::from(&config.engine);

    assert!(!config.policy.auto_push);
    assert!(!config.policy.auto_stash);
    assert_eq!(options.workers, 4);
    assert_eq!(options.timeout, Duration::from_secs(60));
    assert_eq!(options.default_remote, "origin");
    assert!(config.repositories[0].enabled);
}

#[rstest]
#[case("config.json", r#"{"repositories": [{"name": "demo", "path": "/srv/demo"}]}"#)]
#[case("config.yaml", "repositories:\n  - name: demo\n    path: /srv/demo\n")]
#[case("config.yml", "repositories:\n  - name: demo\n    path: /srv/demo\n")]
fn test_other_formats_load(#[case] file: &str, #[case] content: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join(file);
    fs::write(&path, content).unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.repositories.len(), 1);
    assert_eq!(config.repositories[0].name, "demo");
}

#[test]
fn test_missing_file_is_config_not_found() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    assert!(matches!(load_config(&path), Err(Error::ConfigNotFound { .. })));
}

#[test]
fn test_unknown_pull_strategy_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[policy]\npull_strategy = \"rebase\"\n").unwrap();

    let err = load_config(&path).unwrap_err();
    assert!(matches!(err, Error::ConfigParse { ref format, .. } if format == "TOML"));
}

#[test]
fn test_duplicate_names_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[[repositories]]\nname = \"demo\"\npath = \"/a\"\n\n[[repositories]]\nname = \"demo\"\npath = \"/b\"\n",
    )
    .unwrap();

    assert!(matches!(
        load_config(&path),
        Err(Error::DuplicateRepository { ref name }) if name == "demo"
    ));
}

#[test]
fn test_empty_path_is_rejected() {
    let config = SyncConfig {
        repositories: vec![RepositoryDescriptor::new("demo", "")],
        ..SyncConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(Error::InvalidDescriptor { .. })
    ));
}

#[test]
fn test_tilde_paths_expand_on_load() {
    let Some(home) = dirs::home_dir() else {
        return;
    };
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[engine]\nlog_file = \"~/logs/reposync.jsonl\"\n\n[[repositories]]\nname = \"demo\"\npath = \"~/src/demo\"\n",
    )
    .unwrap();

    let config = load_config(&path).unwrap();

    assert_eq!(config.repositories[0].path, home.join("src/demo"));
    assert_eq!(
        config.engine.log_file,
        Some(home.join("logs/reposync.jsonl"))
    );
}

#[test]
fn test_save_then_load_keeps_descriptor_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.yaml");
    let config = SyncConfig {
        repositories: vec![
            RepositoryDescriptor::new("zeta", "/srv/zeta"),
            RepositoryDescriptor::new("alpha", "/srv/alpha"),
        ],
        ..SyncConfig::default()
    };

    ConfigStore::new().save(&path, &config).unwrap();
    let loaded = load_config(&path).unwrap();

    assert_eq!(loaded.find("zeta").map(|d| d.path.clone()), Some(PathBuf::from("/srv/zeta")));
    assert_eq!(loaded.repositories[0].name, "zeta");
    assert_eq!(loaded.repositories[1].name, "alpha");
}

#[test]
fn test_zero_timeout_is_clamped_to_one_second() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[engine]\ntimeout_secs = 0\n").unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(
        EngineOptions::from(&config.engine).timeout,
        Duration::from_secs(1)
    );
}
