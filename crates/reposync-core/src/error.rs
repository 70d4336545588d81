//! Error types for reposync-core
//!
//! Only pass-level failures surface here. Per-repository failures are
//! captured into a `SyncResult` with status `error` and never abort a pass.

use std::path::PathBuf;

/// Result type for reposync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in reposync-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Failed to parse {format} config at {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Failed to serialize {format} config for {path}: {message}")]
    ConfigSerialize {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },

    /// Two descriptors share a name
    #[error("Repository '{name}' is configured more than once")]
    DuplicateRepository { name: String },

    #[error("Invalid repository descriptor '{name}': {message}")]
    InvalidDescriptor { name: String, message: String },

    /// Another pass over the same descriptor set is still running
    #[error("A reconciliation pass is already in flight")]
    PassInFlight,

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },

    #[error("Outcome sink error: {message}")]
    Sink { message: String },

    /// Version-control error from reposync-git
    #[error(transparent)]
    Vcs(#[from] reposync_git::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
