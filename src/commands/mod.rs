//! CLI commands for fork-rail
//!
//! ## Releases
//! - **package**: build and upload the Python distributions
//! - **image**: build and push the container image matrix
//! - **version**: show the release version the tags resolve to
//! - **restore**: put back files left overlaid by a killed run
//!
//! ## Branches
//! - **sync**: reconcile the fork's branches with upstream

pub mod image;
pub mod package;
pub mod restore;
pub mod sync;
pub mod version;

pub use image::run_image;
pub use package::run_package;
pub use restore::run_restore;
pub use sync::run_sync;
pub use version::run_version;

use crate::core::config::ReleaseConfig;
use crate::core::error::ReleaseResult;
use crate::core::vcs::SystemGit;
use std::env;

/// Open the repository containing the current directory and its config
fn open_workspace() -> ReleaseResult<(SystemGit, ReleaseConfig)> {
  let current_dir = env::current_dir()?;
  let git = SystemGit::open(&current_dir)?;
  let config = ReleaseConfig::load(git.work_tree())?;
  Ok((git, config))
}
