//! Shared test utilities for the reposync workspace.
//!
//! This crate provides standardised test fixtures so each crate's test
//! suite does not rebuild its own. It is a dev-dependency only, never
//! published.
//!
//! # Modules
//!
//! - [`fake`]: [`FakeVcs`], a scripted in-memory [`reposync_git::VcsClient`]
//! - [`git`]: real git repositories: a bare remote plus working clones

pub mod fake;
pub mod git;

pub use fake::{Call, CallKind, FakeRepo, FakeVcs};
pub use git::GitFixture;
