//! Outcome sinks
//!
//! Every pass reports its per-repository results, and finally a
//! [`RunSummary`], to an [`OutcomeSink`]. Sinks are shared by all workers
//! of a pass, so implementations serialize their own writes.

mod jsonl;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::model::{SyncResult, SyncStatus};
use crate::summary::RunSummary;

pub use jsonl::JsonlSink;

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// One timestamped line in the outcome log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: EventLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SyncStatus>,
}

impl LogEvent {
    pub fn new(level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            repository: None,
            status: None,
        }
    }

    /// Event describing one repository outcome, at the status's level.
    pub fn for_result(result: &SyncResult) -> Self {
        Self {
            timestamp: Utc::now(),
            level: result.status.level(),
            message: format!("{}: {}", result.status, result.reason),
            repository: Some(result.name.clone()),
            status: Some(result.status),
        }
    }
}

/// Destination for per-repository events and the end-of-pass summary.
pub trait OutcomeSink: Send + Sync {
    /// Record one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be persisted. The
    /// orchestrator logs such failures and carries on.
    fn record(&self, event: &LogEvent) -> Result<()>;

    /// Called once at the end of every pass, after all events.
    ///
    /// # Errors
    ///
    /// Returns an error if the summary could not be persisted.
    fn finish(&self, summary: &RunSummary, results: &[SyncResult]) -> Result<()>;
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl OutcomeSink for TracingSink {
    fn record(&self, event: &LogEvent) -> Result<()> {
        let repo = event.repository.as_deref().unwrap_or("-");
        match event.level {
            EventLevel::Debug => tracing::debug!(repo, "{}", event.message),
            EventLevel::Info => tracing::info!(repo, "{}", event.message),
            EventLevel::Warning => tracing::warn!(repo, "{}", event.message),
            EventLevel::Error => tracing::error!(repo, "{}", event.message),
        }
        Ok(())
    }

    fn finish(&self, summary: &RunSummary, _results: &[SyncResult]) -> Result<()> {
        tracing::info!(run_id = %summary.run_id, "{summary}");
        Ok(())
    }
}

/// Keeps everything in memory. Used by tests and by callers that render
/// results themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
    summaries: Mutex<Vec<RunSummary>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn summaries(&self) -> Vec<RunSummary> {
        self.summaries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events about `name`, in recording order.
    pub fn events_for(&self, name: &str) -> Vec<LogEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.repository.as_deref() == Some(name))
            .collect()
    }
}

impl OutcomeSink for MemorySink {
    fn record(&self, event: &LogEvent) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }

    fn finish(&self, summary: &RunSummary, _results: &[SyncResult]) -> Result<()> {
        self.summaries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(summary.clone());
        Ok(())
    }
}

/// Sends everything to several sinks. Every sink sees every call; the
/// first error is returned after all have run.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn OutcomeSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    fn each(&self, f: impl Fn(&dyn OutcomeSink) -> Result<()>) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = f(sink.as_ref()) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl OutcomeSink for FanoutSink {
    fn record(&self, event: &LogEvent) -> Result<()> {
        self.each(|sink| sink.record(event))
    }

    fn finish(&self, summary: &RunSummary, results: &[SyncResult]) -> Result<()> {
        self.each(|sink| sink.finish(summary, results))
    }
}
