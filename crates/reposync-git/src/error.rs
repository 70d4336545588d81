//! Error types for reposync-git

use std::path::PathBuf;
use std::time::Duration;

/// Result type for reposync-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in reposync-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Remote '{name}' not found")]
    RemoteNotFound { name: String },

    #[error("Branch '{name}' not found")]
    BranchNotFound { name: String },

    #[error("Push of {refname} rejected: {message}")]
    PushRejected { refname: String, message: String },

    #[error("Cannot fast-forward: {message}")]
    CannotFastForward { message: String },

    #[error("Working tree at {path} has uncommitted changes")]
    DirtyWorkingTree { path: PathBuf },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("{operation} was cancelled")]
    Cancelled { operation: String },

    #[error("Worker running {operation} exited without a result")]
    WorkerLost { operation: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
