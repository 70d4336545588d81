//! Format-agnostic configuration loading and saving

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::{Policy, RepositoryDescriptor, expand_home};
use crate::{Error, Result};

fn default_workers() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_remote() -> String {
    "origin".to_string()
}

/// Engine tuning that is not part of the reconciliation policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Upper bound on repositories processed concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Bound on each version-control call, in seconds; zero counts as one
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_remote")]
    pub default_remote: String,

    /// Append-only JSON-lines outcome log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout_secs: default_timeout_secs(),
            default_remote: default_remote(),
            log_file: None,
        }
    }
}

impl EngineSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Everything the descriptor store supplies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub policy: Policy,

    #[serde(default)]
    pub engine: EngineSettings,

    /// Processed in this order every pass
    #[serde(default)]
    pub repositories: Vec<RepositoryDescriptor>,
}

impl SyncConfig {
    /// Check descriptor names are present and unique and paths non-empty.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRepository` or `InvalidDescriptor` for the first
    /// offending entry.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for repo in &self.repositories {
            if repo.name.trim().is_empty() {
                return Err(Error::InvalidDescriptor {
                    name: repo.path.display().to_string(),
                    message: "name must not be empty".into(),
                });
            }
            if repo.path.as_os_str().is_empty() {
                return Err(Error::InvalidDescriptor {
                    name: repo.name.clone(),
                    message: "path must not be empty".into(),
                });
            }
            if !seen.insert(repo.name.as_str()) {
                return Err(Error::DuplicateRepository {
                    name: repo.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Expand `~` in repository and log paths.
    pub fn expand_paths(&mut self) {
        for repo in &mut self.repositories {
            repo.path = expand_home(&repo.path);
        }
        if let Some(log_file) = &self.engine.log_file {
            self.engine.log_file = Some(expand_home(log_file));
        }
    }

    pub fn find(&self, name: &str) -> Option<&RepositoryDescriptor> {
        self.repositories.iter().find(|r| r.name == name)
    }
}

/// Default location: `<config dir>/reposync/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("reposync").join("config.toml"))
}

/// Load, expand and validate a [`SyncConfig`].
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file is missing, a parse error for
/// malformed content, or a validation error.
pub fn load_config(path: &Path) -> Result<SyncConfig> {
    if !path.exists() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let mut config: SyncConfig = ConfigStore::new().load(path)?;
    config.expand_paths();
    config.validate()?;
    Ok(config)
}

/// Format-agnostic configuration store.
///
/// Detects format from file extension and handles
/// serialization/deserialization transparently.
#[derive(Debug, Default)]
pub struct ConfigStore;

impl ConfigStore {
    pub fn new() -> Self {
        Self
    }

    /// Load configuration from a file.
    ///
    /// Format is detected from file extension:
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    /// - `.yaml`, `.yml` -> YAML
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let parse_error = |format: &str, message: String| Error::ConfigParse {
            path: path.to_path_buf(),
            format: format.into(),
            message,
        };

        match extension(path).as_str() {
            "toml" => toml::from_str(&content).map_err(|e| parse_error("TOML", e.to_string())),
            "json" => {
                serde_json::from_str(&content).map_err(|e| parse_error("JSON", e.to_string()))
            }
            "yaml" | "yml" => {
                serde_yaml::from_str(&content).map_err(|e| parse_error("YAML", e.to_string()))
            }
            other => Err(Error::UnsupportedFormat {
                extension: other.to_string(),
            }),
        }
    }

    /// Save configuration to a file.
    ///
    /// Format is determined from file extension.
    /// Uses atomic write to prevent corruption.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let serialize_error = |format: &str, message: String| Error::ConfigSerialize {
            path: path.to_path_buf(),
            format: format.into(),
            message,
        };

        let content = match extension(path).as_str() {
            "toml" => toml::to_string_pretty(value)
                .map_err(|e| serialize_error("TOML", e.to_string()))?,
            "json" => serde_json::to_string_pretty(value)
                .map_err(|e| serialize_error("JSON", e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::to_string(value).map_err(|e| serialize_error("YAML", e.to_string()))?
            }
            other => {
                return Err(Error::UnsupportedFormat {
                    extension: other.to_string(),
                });
            }
        };

        write_atomic(path, content.as_bytes())
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Write content atomically: temp file in the same directory, locked,
/// synced, then renamed over the target.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(&temp_name);

    let written = write_locked(&temp_path, content).and_then(|()| {
        fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))
    });
    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    written
}

/// Write `content` to a fresh file under an exclusive lock and sync it.
fn write_locked(temp_path: &Path, content: &[u8]) -> Result<()> {
    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(temp_path)
        .map_err(|e| Error::io(temp_path, e))?;

    temp_file
        .lock_exclusive()
        .map_err(|_| Error::LockFailed {
            path: temp_path.to_path_buf(),
        })?;
    let result = temp_file
        .write_all(content)
        .and_then(|()| temp_file.sync_all())
        .map_err(|e| Error::io(temp_path, e));
    let _ = FileExt::unlock(&temp_file);
    result
}
