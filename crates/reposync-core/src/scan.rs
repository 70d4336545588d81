//! Repository discovery
//!
//! Finds working copies directly under a root directory that are not yet
//! tracked, so they can be added to the configuration.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use reposync_git::VcsClient;

use crate::config::{ConfigStore, RepositoryDescriptor, SyncConfig};
use crate::{Error, Result};

/// List untracked repositories among the immediate subdirectories of
/// `root`, sorted by name.
///
/// Hidden directories are skipped, as are directories whose path or name
/// is already used by a descriptor in `known`.
///
/// # Errors
///
/// Returns an I/O error if `root` cannot be read.
pub fn discover(
    root: &Path,
    known: &[RepositoryDescriptor],
    client: &dyn VcsClient,
) -> Result<Vec<RepositoryDescriptor>> {
    let known_paths: HashSet<PathBuf> = known.iter().map(|d| canonical(&d.path)).collect();
    let mut names: HashSet<String> = known.iter().map(|d| d.name.clone()).collect();

    let mut found = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| Error::io(root, e))? {
        let entry = entry.map_err(|e| Error::io(root, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') || !client.is_repository(&path) {
            continue;
        }
        if known_paths.contains(&canonical(&path)) {
            continue;
        }
        if names.contains(&name) {
            tracing::warn!(name = %name, path = %path.display(), "Name already tracked; skipping");
            continue;
        }
        names.insert(name.clone());
        found.push(RepositoryDescriptor::new(name, canonical(&path)));
    }

    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

/// Append `discovered` to the configuration file at `config_path`,
/// creating it if missing. Paths already present are left alone.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or written.
pub fn add_to_config(config_path: &Path, discovered: &[RepositoryDescriptor]) -> Result<usize> {
    let store = ConfigStore::new();
    let mut config: SyncConfig = if config_path.exists() {
        store.load(config_path)?
    } else {
        SyncConfig::default()
    };

    let before = config.repositories.len();
    for descriptor in discovered {
        let duplicate = config
            .repositories
            .iter()
            .any(|d| d.name == descriptor.name || d.path == descriptor.path);
        if !duplicate {
            config.repositories.push(descriptor.clone());
        }
    }
    let added = config.repositories.len() - before;

    config.validate()?;
    store.save(config_path, &config)?;
    Ok(added)
}

fn canonical(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
