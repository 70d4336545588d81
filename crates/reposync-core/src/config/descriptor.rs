//! Repository descriptors

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

fn default_enabled() -> bool {
    true
}

/// One tracked repository, immutable for the duration of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    /// Unique display name
    pub name: String,

    /// Working copy location
    pub path: PathBuf,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Remote to reconcile against; falls back to the engine default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
}

impl RepositoryDescriptor {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            enabled: true,
            remote: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    /// The remote for this repository, or `default` when none is set.
    pub fn remote_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.remote.as_deref().unwrap_or(default)
    }
}

/// Expand a leading `~` to the user's home directory.
///
/// Paths without the prefix, and all paths when no home directory is
/// known, are returned unchanged.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
