//! `fork-rail image`

use crate::commands::open_workspace;
use crate::core::error::{ExitCode, ReleaseResult};
use crate::core::process::SystemRunner;
use crate::release::image::{ImageOptions, release_images};
use crate::release::{PendingMutations, RegistryCoordinates, ReleaseContext};
use chrono::Utc;

/// Build the image matrix and push it to the registry
pub fn run_image(
  pending: &PendingMutations,
  project: &str,
  region: &str,
  repository: &str,
  options: &ImageOptions,
) -> ReleaseResult<ExitCode> {
  let registry = RegistryCoordinates::new(project, region, repository)?;
  let (git, config) = open_workspace()?;

  println!("🐳 Image release to {}", registry.docker_base());
  let ctx = ReleaseContext {
    root: git.work_tree().to_path_buf(),
    config: &config,
    runner: &SystemRunner,
    pending,
    tags: git.tags_by_creation()?,
    commit: git.head_commit()?,
    build_date: Utc::now(),
  };

  let report = release_images(&ctx, &registry, options)?;
  if report.is_success() {
    println!("\n✅ Images for {} done", report.version);
    Ok(ExitCode::Success)
  } else {
    println!(
      "\n❌ {} of {} image(s) failed",
      report.builds.failed().len(),
      report.builds.attempted()
    );
    Ok(ExitCode::Partial)
  }
}
