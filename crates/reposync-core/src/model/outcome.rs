//! Executor output

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sink::EventLevel;

/// Closed set of per-repository outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    SkippedDisabled,
    SkippedNoPath,
    SkippedNotRepo,
    SkippedNoRemote,
    SkippedDetached,
    SkippedEmpty,
    Dirty,
    DryRun,
    Pulled,
    Pushed,
    UpToDate,
    Ahead,
    Diverged,
    Error,
}

impl SyncStatus {
    pub const ALL: [SyncStatus; 14] = [
        Self::SkippedDisabled,
        Self::SkippedNoPath,
        Self::SkippedNotRepo,
        Self::SkippedNoRemote,
        Self::SkippedDetached,
        Self::SkippedEmpty,
        Self::Dirty,
        Self::DryRun,
        Self::Pulled,
        Self::Pushed,
        Self::UpToDate,
        Self::Ahead,
        Self::Diverged,
        Self::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SkippedDisabled => "skipped-disabled",
            Self::SkippedNoPath => "skipped-no-path",
            Self::SkippedNotRepo => "skipped-not-repo",
            Self::SkippedNoRemote => "skipped-no-remote",
            Self::SkippedDetached => "skipped-detached",
            Self::SkippedEmpty => "skipped-empty",
            Self::Dirty => "dirty",
            Self::DryRun => "dry-run",
            Self::Pulled => "pulled",
            Self::Pushed => "pushed",
            Self::UpToDate => "up-to-date",
            Self::Ahead => "ahead",
            Self::Diverged => "diverged",
            Self::Error => "error",
        }
    }

    pub fn is_skipped(self) -> bool {
        matches!(
            self,
            Self::SkippedDisabled
                | Self::SkippedNoPath
                | Self::SkippedNotRepo
                | Self::SkippedNoRemote
                | Self::SkippedDetached
                | Self::SkippedEmpty
        )
    }

    /// Outcomes an operator has to look at.
    pub fn needs_attention(self) -> bool {
        matches!(self, Self::Error | Self::Diverged | Self::Dirty)
    }

    /// Log severity: preconditions, dirty trees and divergence warn;
    /// operational failures are errors.
    pub fn level(self) -> EventLevel {
        match self {
            Self::Error => EventLevel::Error,
            Self::Dirty | Self::Diverged => EventLevel::Warning,
            Self::SkippedDisabled => EventLevel::Info,
            s if s.is_skipped() => EventLevel::Warning,
            _ => EventLevel::Info,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one repository in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub name: String,
    pub status: SyncStatus,
    pub reason: String,
}

impl SyncResult {
    pub fn new(name: impl Into<String>, status: SyncStatus, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            reason: reason.into(),
        }
    }

    pub fn error(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(name, SyncStatus::Error, reason)
    }
}
