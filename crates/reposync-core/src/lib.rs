//! Repository reconciliation engine
//!
//! Keeps a set of local git working copies in step with their remotes
//! without ever losing work. Each pass runs every tracked repository
//! through four stages:
//!
//! - **Inspector**: read-only snapshot of the working copy and its remote
//! - **Decision Engine**: pure classification into a [`PlannedAction`]
//! - **Executor**: performs the action (fast-forward or push only)
//! - **Orchestrator**: runs the pass on a worker pool and reports to an
//!   [`OutcomeSink`]
//!
//! ```text
//!        reposync-cli
//!             |
//!       reposync-core ---- OutcomeSink (jsonl, tracing)
//!             |
//!       reposync-git (VcsClient)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use reposync_core::{EngineOptions, Orchestrator, RunOverrides, TracingSink, load_config};
//! use reposync_git::Git2Client;
//!
//! let config = load_config(path)?;
//! let orchestrator = Orchestrator::new(
//!     Arc::new(Git2Client::new()),
//!     Arc::new(TracingSink),
//!     EngineOptions::from(&config.engine),
//! );
//! let summary = orchestrator.run(&config.repositories, &config.policy, RunOverrides::default())?;
//! println!("{summary}");
//! ```

pub mod config;
pub mod decision;
pub mod error;
pub mod executor;
pub mod inspector;
pub mod lock;
pub mod model;
pub mod orchestrator;
pub mod scan;
pub mod sink;
pub mod summary;

pub use config::{
    ConfigStore, EngineSettings, Policy, PullStrategy, RepositoryDescriptor, RunOverrides,
    SyncConfig, default_config_path, load_config,
};
pub use decision::decide;
pub use error::{Error, Result};
pub use executor::Executor;
pub use inspector::Inspector;
pub use lock::{PassGuard, PassLock, PathLease, PathLocks};
pub use model::{
    Inspection, PlannedAction, Precondition, RepositoryState, SkipReason, SyncResult, SyncStatus,
};
pub use orchestrator::{EngineOptions, Orchestrator, PlanEntry};
pub use sink::{EventLevel, FanoutSink, JsonlSink, LogEvent, MemorySink, OutcomeSink, TracingSink};
pub use summary::RunSummary;
