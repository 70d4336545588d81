//! Timeouts and cancellation for version-control calls
//!
//! An unresponsive remote must not stall a whole pass. Every call made
//! through a [`crate::VcsClient`] carries an [`OpContext`]; [`OpContext::run`]
//! executes the call on a worker thread and stops waiting once the timeout
//! elapses. Network callbacks poll the shared [`Interrupt`] so an abandoned
//! worker winds down at the next progress tick instead of running on.
//!
//! An abandoned worker may still be touching the repository. The context
//! counts its workers, and [`OpContext::wait_for_workers`] blocks until all
//! of them have exited, so a caller can keep the repository exclusive until
//! nothing is running against it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::{Error, Result};

/// Default bound for a single version-control call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Cooperative cancellation flag shared between a caller and its workers.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear a previous cancellation request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Stop signal observed by a running operation.
///
/// Raised either when the caller cancels or when the caller gave up
/// waiting because the timeout elapsed.
#[derive(Debug, Clone)]
pub struct Interrupt {
    cancel: CancellationToken,
    expired: Arc<AtomicBool>,
    timeout: Duration,
}

impl Interrupt {
    pub(crate) fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self {
            cancel,
            expired: Arc::new(AtomicBool::new(false)),
            timeout,
        }
    }

    /// Mark the operation as abandoned by its caller.
    pub(crate) fn expire(&self) {
        self.expired.store(true, Ordering::SeqCst);
    }

    pub fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.expired.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled` or `Timeout` once the operation should stop.
    ///
    /// Mutating operations call this before every step that changes the
    /// repository.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` or `Error::Timeout`.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled {
                operation: operation.to_string(),
            });
        }
        if self.expired.load(Ordering::SeqCst) {
            return Err(Error::Timeout {
                operation: operation.to_string(),
                after: self.timeout,
            });
        }
        Ok(())
    }
}

/// Number of workers still running for one context.
#[derive(Debug, Default)]
struct Workers {
    running: Mutex<usize>,
    exited: Condvar,
}

/// Held by a worker thread for as long as it runs.
struct WorkerSlot(Arc<Workers>);

impl WorkerSlot {
    fn claim(workers: &Arc<Workers>) -> Self {
        *workers
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += 1;
        Self(Arc::clone(workers))
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        let mut running = self
            .0
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *running = running.saturating_sub(1);
        self.0.exited.notify_all();
    }
}

/// Per-call execution context: a timeout plus a cancellation token.
///
/// Clones share the same cancellation token and worker count.
#[derive(Debug, Clone)]
pub struct OpContext {
    timeout: Duration,
    cancel: CancellationToken,
    workers: Arc<Workers>,
}

impl Default for OpContext {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl OpContext {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cancel: CancellationToken::new(),
            workers: Arc::default(),
        }
    }

    /// Share an existing cancellation token with this context.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Workers started through this context that have not exited yet,
    /// including ones abandoned after a timeout.
    pub fn running_workers(&self) -> usize {
        *self
            .workers
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until every worker started through this context has exited.
    pub fn wait_for_workers(&self) {
        let mut running = self
            .workers
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *running > 0 {
            tracing::debug!(running = *running, "Waiting for abandoned version-control workers");
        }
        while *running > 0 {
            running = self
                .workers
                .exited
                .wait(running)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Fail fast if the context was already cancelled.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    /// Run `op` on a worker thread, waiting at most [`Self::timeout`].
    ///
    /// On timeout the worker is signalled through its [`Interrupt`] and
    /// `Error::Timeout` is returned immediately; the worker's eventual
    /// result is discarded. The worker still counts towards
    /// [`Self::wait_for_workers`] until it exits.
    ///
    /// # Errors
    ///
    /// Returns the operation's own error, `Error::Timeout`,
    /// `Error::Cancelled`, or `Error::WorkerLost` if the worker panicked.
    pub fn run<T, F>(&self, operation: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Interrupt) -> Result<T> + Send + 'static,
    {
        self.check(operation)?;

        let interrupt = Interrupt::new(self.cancel.clone(), self.timeout);
        let worker_interrupt = interrupt.clone();
        let slot = WorkerSlot::claim(&self.workers);
        let (tx, rx) = mpsc::channel();

        thread::Builder::new()
            .name(format!("reposync-{operation}"))
            .spawn(move || {
                let _slot = slot;
                // Receiver may be gone after a timeout.
                let _ = tx.send(op(&worker_interrupt));
            })
            .map_err(|e| Error::io(format!("<{operation} worker>"), e))?;

        match rx.recv_timeout(self.timeout) {
            Ok(Err(_)) if self.cancel.is_cancelled() => Err(Error::Cancelled {
                operation: operation.to_string(),
            }),
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                interrupt.expire();
                tracing::warn!(
                    operation = %operation,
                    timeout_secs = self.timeout.as_secs(),
                    "Version-control call timed out"
                );
                Err(Error::Timeout {
                    operation: operation.to_string(),
                    after: self.timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::WorkerLost {
                operation: operation.to_string(),
            }),
        }
    }
}
