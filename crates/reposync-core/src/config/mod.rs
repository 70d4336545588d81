//! Descriptor store: the tracked repositories and process-wide policy
//!
//! The engine treats everything here as read-only input for one pass.
//! Configuration files are loaded by extension (TOML, JSON or YAML); see
//! [`ConfigStore`].

mod descriptor;
mod policy;
mod store;

pub use descriptor::{RepositoryDescriptor, expand_home};
pub use policy::{Policy, PullStrategy, RunOverrides};
pub use store::{ConfigStore, EngineSettings, SyncConfig, default_config_path, load_config};
