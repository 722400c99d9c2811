//! `fork-rail package`

use crate::commands::open_workspace;
use crate::core::error::{ExitCode, ReleaseResult};
use crate::core::process::SystemRunner;
use crate::release::package::{PackageOptions, release_packages};
use crate::release::{PendingMutations, RegistryCoordinates, ReleaseContext};
use chrono::Utc;

/// Build every distribution and upload it to the registry's Python index
pub fn run_package(
  pending: &PendingMutations,
  project: &str,
  region: &str,
  repository: &str,
  options: PackageOptions,
) -> ReleaseResult<ExitCode> {
  let registry = RegistryCoordinates::new(project, region, repository)?;
  let (git, config) = open_workspace()?;

  println!("📦 Package release for {}", config.package.name);
  let ctx = ReleaseContext {
    root: git.work_tree().to_path_buf(),
    config: &config,
    runner: &SystemRunner,
    pending,
    tags: git.tags_by_creation()?,
    commit: git.head_commit()?,
    build_date: Utc::now(),
  };

  let report = release_packages(&ctx, &registry, options)?;
  let code = report.exit_code();
  match code {
    ExitCode::Success if options.dry_run => println!("\n✅ Dry run complete for {}", report.version),
    ExitCode::Success => println!("\n✅ Released {} {}", config.package.name, report.version),
    ExitCode::Partial => println!("\n⚠️  Release {} finished with failures", report.version),
    _ => println!("\n❌ Every build of {} failed", report.version),
  }
  Ok(code)
}
