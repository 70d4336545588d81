//! Real git repositories for end-to-end tests.
//!
//! Realism level: **REAL WITH REMOTE**: a bare repository acting as the
//! remote plus any number of clones, all inside one temporary directory.
//! Built with the `git` CLI so the code under test (libgit2) never sets up
//! its own fixtures.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Run `git` in `dir` and return trimmed stdout.
///
/// # Panics
/// Panics if git cannot be spawned or exits non-zero.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("failed to run `git {args:?}`: {e}"));
    if !output.status.success() {
        panic!(
            "`git {args:?}` failed in {}:\n{}",
            dir.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Configure a throwaway identity so commits work on any CI machine.
pub fn configure_identity(dir: &Path) {
    git(dir, &["config", "user.email", "test@test.com"]);
    git(dir, &["config", "user.name", "Test User"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

/// Write `file` with `content`, commit it, and return the new commit id.
pub fn commit_file(dir: &Path, file: &str, content: &str) -> String {
    fs::write(dir.join(file), content)
        .unwrap_or_else(|e| panic!("commit_file: failed to write {file}: {e}"));
    git(dir, &["add", file]);
    git(dir, &["commit", "-m", &format!("Update {file}")]);
    rev_parse(dir, "HEAD")
}

/// Resolve `rev` to a full commit id.
pub fn rev_parse(dir: &Path, rev: &str) -> String {
    git(dir, &["rev-parse", rev])
}

/// A bare remote with one commit on `main`, plus helpers to clone it.
pub struct GitFixture {
    temp_dir: TempDir,
    remote: PathBuf,
}

impl Default for GitFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl GitFixture {
    /// Create the bare remote and seed it with an initial commit on `main`.
    ///
    /// # Panics
    /// Panics if any git operation fails.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let remote = root.join("remote.git");

        git(root, &["init", "--bare", "remote.git"]);
        git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        let seed = root.join("seed");
        fs::create_dir(&seed).unwrap();
        git(&seed, &["init"]);
        configure_identity(&seed);
        git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        commit_file(&seed, "README.md", "# Test");
        git(&seed, &["remote", "add", "origin", remote.to_str().unwrap()]);
        git(&seed, &["push", "origin", "main"]);
        fs::remove_dir_all(&seed).unwrap();

        Self { temp_dir, remote }
    }

    /// Directory holding the remote and all clones.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of the bare remote repository.
    pub fn remote(&self) -> &Path {
        &self.remote
    }

    /// Clone the remote into `<root>/<name>` with an identity configured.
    pub fn clone_repo(&self, name: &str) -> PathBuf {
        git(
            self.root(),
            &["clone", self.remote.to_str().unwrap(), name],
        );
        let path = self.root().join(name);
        configure_identity(&path);
        path
    }

    /// Commit in a fresh scratch clone and push it, simulating another
    /// machine advancing `main`. Returns the pushed commit id.
    pub fn push_from_elsewhere(&self, file: &str, content: &str) -> String {
        let scratch = self.root().join(".elsewhere");
        if !scratch.exists() {
            self.clone_repo(".elsewhere");
        } else {
            git(&scratch, &["pull", "--ff-only", "origin", "main"]);
        }
        let id = commit_file(&scratch, file, content);
        git(&scratch, &["push", "origin", "main"]);
        id
    }

    /// Current tip of `branch` on the remote.
    pub fn remote_tip(&self, branch: &str) -> String {
        rev_parse(&self.remote, &format!("refs/heads/{branch}"))
    }
}
