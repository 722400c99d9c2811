//! Core engine for fork-rail operations
//!
//! - **config**: release.toml parsing and validation
//! - **error**: error types with contextual help messages and exit codes
//! - **process**: external tool invocation (build backends, upload client, registry CLI)
//! - **sync**: upstream/fork branch reconciliation
//! - **vcs**: git operations (SystemGit)

pub mod config;
pub mod error;
pub mod process;
pub mod sync;
pub mod vcs;
