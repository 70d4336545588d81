//! Append-only JSON-lines outcome log

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use fs2::FileExt;
use serde::Serialize;

use super::{LogEvent, OutcomeSink};
use crate::model::SyncResult;
use crate::summary::RunSummary;
use crate::{Error, Result};

/// Appends one JSON object per line.
///
/// Each write takes an exclusive file lock, so several processes can share
/// one log without interleaving lines.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<File>,
}

#[derive(Serialize)]
struct SummaryLine<'a> {
    summary: &'a RunSummary,
    results: &'a [SyncResult],
}

impl JsonlSink {
    /// Open (creating if needed) the log at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file or its parent directory cannot be
    /// created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append<T: Serialize>(&self, value: &T) -> Result<()> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.lock_exclusive().map_err(|_| Error::LockFailed {
            path: self.path.clone(),
        })?;
        let written = file.write_all(&line).and_then(|()| file.flush());
        let _ = FileExt::unlock(&*file);
        written.map_err(|e| Error::io(&self.path, e))
    }
}

impl OutcomeSink for JsonlSink {
    fn record(&self, event: &LogEvent) -> Result<()> {
        self.append(event)
    }

    fn finish(&self, summary: &RunSummary, results: &[SyncResult]) -> Result<()> {
        self.append(&SummaryLine { summary, results })
    }
}
