//! State shared by the package and image flows for one run

use crate::core::config::ReleaseConfig;
use crate::core::error::{ConfigError, ReleaseError, ReleaseResult, ResultExt};
use crate::core::process::ToolRunner;
use crate::core::vcs::TagInfo;
use crate::release::metadata::{BuildInfo, pin_manifest_version};
use crate::release::overlay::{PendingMutations, TrackedMutation, backup_path_for, with_overlay};
use crate::release::version::{ReleaseVersion, VersionResolver};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// Files overlaid while one distribution is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayPaths {
  pub build_info: PathBuf,
  pub manifest: PathBuf,
}

impl OverlayPaths {
  pub fn all(&self) -> [&Path; 2] {
    [self.build_info.as_path(), self.manifest.as_path()]
  }
}

pub struct ReleaseContext<'a> {
  /// Repository root; staging directories live here so renames stay atomic
  pub root: PathBuf,
  pub config: &'a ReleaseConfig,
  pub runner: &'a dyn ToolRunner,
  pub pending: &'a PendingMutations,
  pub tags: Vec<TagInfo>,
  pub commit: String,
  pub build_date: DateTime<Utc>,
}

impl ReleaseContext<'_> {
  /// Build-info module and manifest of the primary package
  pub fn primary_paths(&self) -> OverlayPaths {
    OverlayPaths {
      build_info: self.root.join(&self.config.package.build_info),
      manifest: self.root.join(&self.config.package.manifest),
    }
  }

  /// Generated content for `paths` at `version`
  pub fn mutations(&self, paths: &OverlayPaths, version: &ReleaseVersion) -> ReleaseResult<Vec<TrackedMutation>> {
    let info = BuildInfo::for_release(version, &self.commit, self.build_date).render()?;

    let manifest = fs::read_to_string(&paths.manifest)
      .with_context(|| format!("Failed to read manifest {}", paths.manifest.display()))?;
    let pinned = pin_manifest_version(&manifest, version)
      .with_context(|| format!("Failed to pin version in {}", paths.manifest.display()))?;

    Ok(vec![
      TrackedMutation::new(&paths.build_info, info),
      TrackedMutation::new(&paths.manifest, pinned),
    ])
  }

  /// Run `action` with `paths` overlaid for `version`
  pub fn with_version_overlay<T>(
    &self,
    paths: &OverlayPaths,
    version: &ReleaseVersion,
    action: impl FnOnce() -> ReleaseResult<T>,
  ) -> ReleaseResult<T> {
    let mutations = self.mutations(paths, version)?;
    with_overlay(self.pending, &self.root, &mutations, action)
  }

  /// Print the newest matching tags and the version picked from them
  pub fn print_resolution(&self, resolver: &VersionResolver, version: &ReleaseVersion) {
    println!("🏷️  Release version: {} ({} tags)", version, resolver.policy());
    for candidate in resolver.candidates(&self.tags, None).iter().take(5) {
      println!("   {} (created {})", candidate.tag.name, format_timestamp(candidate.tag.created));
    }
  }
}

/// Refuse to start while a previous run's backup is still on disk
pub fn ensure_no_stale_backups<'p>(paths: impl IntoIterator<Item = &'p Path>) -> ReleaseResult<()> {
  for original in paths {
    let backup = backup_path_for(original);
    if backup.symlink_metadata().is_ok() {
      return Err(ReleaseError::Config(ConfigError::StaleBackup {
        original: original.to_path_buf(),
        backup,
      }));
    }
  }
  Ok(())
}

fn format_timestamp(unix: i64) -> String {
  DateTime::<Utc>::from_timestamp(unix, 0)
    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
    .unwrap_or_else(|| unix.to_string())
}
