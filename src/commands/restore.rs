//! `fork-rail restore`

use crate::commands::open_workspace;
use crate::core::error::ReleaseResult;
use crate::release::overlay::recover_stale;
use crate::release::package::{discover_integrations, integration_paths};
use std::path::PathBuf;

/// Put back every tracked file a killed run left overlaid
pub fn run_restore() -> ReleaseResult<()> {
  let (git, config) = open_workspace()?;
  let root = git.work_tree();
  let package = &config.package;

  let mut originals: Vec<PathBuf> = vec![root.join(&package.build_info), root.join(&package.manifest)];
  for integration in discover_integrations(root, package)? {
    let paths = integration_paths(package, &integration.name, &integration.dir);
    originals.push(paths.build_info);
    originals.push(paths.manifest);
  }

  let report = recover_stale(root, &originals)?;
  report.log();

  if report.restored.is_empty() && report.removed_dirs.is_empty() && report.discarded.is_empty() && report.is_clean() {
    println!("✅ Nothing to restore");
    return Ok(());
  }
  for path in &report.restored {
    println!("   ♻️  Restored {}", path.display());
  }
  for dir in &report.removed_dirs {
    println!("   🧹 Removed {}", dir.display());
  }
  for partial in &report.discarded {
    println!("   🗑️  Discarded partial backup {}", partial.display());
  }
  if !report.is_clean() {
    for warning in &report.warnings {
      println!("   ⚠️  {}: {}", warning.path.display(), warning.reason);
    }
    println!("⚠️  Restored {} file(s); fix the files above by hand", report.restored.len());
    return Ok(());
  }
  println!("✅ Restored {} file(s)", report.restored.len());
  Ok(())
}
