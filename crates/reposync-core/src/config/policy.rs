//! Reconciliation policy

use serde::{Deserialize, Serialize};

/// How a behind branch is brought up to date. Only fast-forward is
/// supported: a pull never fabricates a merge commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PullStrategy {
    #[default]
    FfOnly,
}

/// Policy for one pass, owned by the caller and passed into `run()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub pull_strategy: PullStrategy,

    /// Accepted for compatibility; a dirty tree is never stashed.
    #[serde(default)]
    pub auto_stash: bool,

    /// Push branches that are strictly ahead, and publish new branches.
    #[serde(default)]
    pub auto_push: bool,

    /// Classify only; execute nothing.
    #[serde(skip)]
    pub dry_run: bool,

    /// Push this pass even when `auto_push` is off. Never a forced push.
    #[serde(skip)]
    pub force_push: bool,
}

impl Policy {
    /// Apply per-invocation overrides from the trigger.
    pub fn with_overrides(mut self, overrides: RunOverrides) -> Self {
        self.dry_run |= overrides.dry_run;
        self.force_push |= overrides.force_push;
        self
    }

    pub fn push_allowed(&self) -> bool {
        self.auto_push || self.force_push
    }
}

/// Optional overrides a trigger may pass to a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOverrides {
    /// Record every result in the outcome sink, including quiet ones.
    pub verbose: bool,
    pub dry_run: bool,
    pub force_push: bool,
}
