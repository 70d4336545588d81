//! Version-control abstraction for reposync
//!
//! The reconciliation engine never talks to git directly. Every query and
//! mutation goes through the [`VcsClient`] capability so a pass can run
//! against real repositories ([`Git2Client`]) or scripted fakes in tests.

pub mod client;
pub mod context;
pub mod error;
pub mod git2_client;

pub use client::{CommitId, VcsClient};
pub use context::{CancellationToken, DEFAULT_TIMEOUT, Interrupt, OpContext};
pub use error::{Error, Result};
pub use git2_client::Git2Client;
