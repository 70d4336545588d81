//! Pass and path locking
//!
//! Three layers keep passes from overlapping:
//!
//! - [`PassGuard`]: in-process "pass in flight" flag, released on drop
//! - [`PathLocks`]: at most one operation per repository path at a time
//! - [`PassLock`]: advisory file lock so two processes never run a pass
//!   over the same configuration concurrently

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

use fs2::FileExt;

use crate::{Error, Result};

/// RAII holder of a pass-in-flight flag.
#[derive(Debug)]
pub struct PassGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> PassGuard<'a> {
    /// Raise `flag`, or fail if it is already raised.
    ///
    /// # Errors
    ///
    /// Returns `PassInFlight` when another pass holds the flag.
    pub fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::PassInFlight)?;
        Ok(Self { flag })
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Registry of repository paths currently being operated on.
#[derive(Debug, Default)]
pub struct PathLocks {
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `path` is free, then hold it until the lease drops.
    ///
    /// Paths are canonicalized when they exist, so two descriptors that
    /// spell the same directory differently still exclude each other.
    pub fn lock(&self, path: &Path) -> PathLease<'_> {
        let key = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while held.contains(&key) {
            tracing::debug!(path = %key.display(), "Waiting for path lock");
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(key.clone());
        PathLease { locks: self, key }
    }

    pub fn is_locked(&self, path: &Path) -> bool {
        let key = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }
}

/// Exclusive hold on one repository path.
#[derive(Debug)]
pub struct PathLease<'a> {
    locks: &'a PathLocks,
    key: PathBuf,
}

impl Drop for PathLease<'_> {
    fn drop(&mut self) {
        self.locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
        self.locks.released.notify_all();
    }
}

/// Cross-process pass lock on a file next to the configuration.
///
/// The lock is held for the lifetime of the value; the OS releases it if
/// the process dies.
#[derive(Debug)]
pub struct PassLock {
    path: PathBuf,
    file: File,
}

impl PassLock {
    /// Lock file used for the configuration at `config_path`.
    pub fn path_for(config_path: &Path) -> PathBuf {
        let mut name = config_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        config_path.with_file_name(name)
    }

    /// Try to take the lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns `PassInFlight` when another process holds the lock, and
    /// `LockFailed` or an I/O error when the lock file is unusable.
    pub fn try_acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(Error::PassInFlight);
            }
            return Err(Error::LockFailed { path });
        }

        // Owner pid, for whoever finds the lock held
        file.set_len(0).map_err(|e| Error::io(&path, e))?;
        writeln!(file, "{}", std::process::id()).map_err(|e| Error::io(&path, e))?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PassLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
