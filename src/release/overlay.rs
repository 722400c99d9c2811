//! Scoped file overlays with guaranteed restoration
//!
//! # Protocol
//!
//! For each tracked file, in order:
//!
//! 1. Register the pending restoration, then copy the original to `<path>.rail-backup`
//!    (written to `<path>.rail-backup.tmp` and renamed, so a backup is either complete or
//!    absent). Symlinked originals are refused before anything is touched.
//! 2. Move the generated content, pre-written into a staging directory, over the original.
//!
//! Restoration moves each backup back (consuming it), deletes overlays that had no
//! original, removes the staging directory, and deregisters each entry only once it is
//! confirmed. It runs when the action returns, when the guard is dropped during a panic,
//! and from the interrupt handler through [`PendingMutations::drain_and_exit`].
//!
//! Every install and restore step happens with the registry lock held, so an interrupt
//! never observes a half-installed mutation.
//!
//! Two fork-rail processes overlaying the same working tree will corrupt each other's
//! backups; there is no cross-process locking.

use crate::core::error::{ConfigError, ReleaseError, ReleaseResult, ResultExt};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

pub const BACKUP_SUFFIX: &str = ".rail-backup";
pub const STAGING_PREFIX: &str = ".rail-stage-";

/// Backup location for a tracked file: the same path with [`BACKUP_SUFFIX`] appended
pub fn backup_path_for(original: &Path) -> PathBuf {
  let mut name = original.as_os_str().to_os_string();
  name.push(BACKUP_SUFFIX);
  PathBuf::from(name)
}

/// Where a backup is written before being renamed into place
fn partial_backup_path_for(original: &Path) -> PathBuf {
  let mut name: OsString = backup_path_for(original).into_os_string();
  name.push(".tmp");
  PathBuf::from(name)
}

/// One file to overlay with generated content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedMutation {
  pub original: PathBuf,
  pub content: Vec<u8>,
}

impl TrackedMutation {
  pub fn new(original: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
    Self {
      original: original.into(),
      content: content.into(),
    }
  }

  pub fn backup_path(&self) -> PathBuf {
    backup_path_for(&self.original)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingRestore {
  original: PathBuf,
  /// `None` when the original did not exist: restoring deletes the overlay
  backup: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct PendingState {
  backups: Vec<PendingRestore>,
  temp_dirs: Vec<PathBuf>,
}

/// Process-wide registry of restorations still owed to the working tree
#[derive(Clone, Default)]
pub struct PendingMutations {
  inner: Arc<Mutex<PendingState>>,
}

impl PendingMutations {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, PendingState> {
    // A panic while holding the lock must not stop restoration
    self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    let state = self.lock();
    state.backups.is_empty() && state.temp_dirs.is_empty()
  }

  /// Originals with a restoration pending
  #[cfg(test)]
  pub fn pending_originals(&self) -> Vec<PathBuf> {
    self.lock().backups.iter().map(|p| p.original.clone()).collect()
  }

  /// Staging directories not yet removed
  #[cfg(test)]
  pub fn pending_temp_dirs(&self) -> Vec<PathBuf> {
    self.lock().temp_dirs.clone()
  }

  /// Restore everything still registered
  #[cfg(test)]
  pub fn drain(&self) -> RestoreReport {
    let mut state = self.lock();
    let all: Vec<PendingRestore> = state.backups.clone();
    let dirs: Vec<PathBuf> = state.temp_dirs.clone();
    restore_locked(&mut state, &all, &dirs)
  }

  /// Drain and terminate, holding the lock so no further mutation can start
  pub fn drain_and_exit(&self, code: i32) -> ! {
    let mut state = self.lock();
    let all: Vec<PendingRestore> = state.backups.clone();
    let dirs: Vec<PathBuf> = state.temp_dirs.clone();
    let report = restore_locked(&mut state, &all, &dirs);
    report.log();
    eprintln!("\n⚠️  Interrupted: restored {} file(s) before exiting", report.restored.len());
    std::process::exit(code)
  }
}

/// A restoration that could not be completed; a human has to fix the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorationWarning {
  pub path: PathBuf,
  pub reason: String,
}

#[derive(Debug, Default)]
pub struct RestoreReport {
  pub restored: Vec<PathBuf>,
  pub removed_dirs: Vec<PathBuf>,
  /// Half-written backups left by a run killed mid-copy
  pub discarded: Vec<PathBuf>,
  pub warnings: Vec<RestorationWarning>,
}

impl RestoreReport {
  pub fn is_clean(&self) -> bool {
    self.warnings.is_empty()
  }

  /// Log failed restorations; these are never escalated to errors
  pub fn log(&self) {
    for warning in &self.warnings {
      tracing::warn!(path = %warning.path.display(), reason = %warning.reason, "could not restore tracked file");
    }
  }

  fn merge(&mut self, other: RestoreReport) {
    self.restored.extend(other.restored);
    self.removed_dirs.extend(other.removed_dirs);
    self.discarded.extend(other.discarded);
    self.warnings.extend(other.warnings);
  }
}

/// Restores the installed overlay when released or dropped
pub struct OverlayGuard {
  pending: PendingMutations,
  installed: Vec<PendingRestore>,
  staging: Option<PathBuf>,
  released: bool,
}

impl OverlayGuard {
  /// Install every mutation; on failure, whatever was installed is restored by `Drop`
  pub fn install(
    pending: &PendingMutations,
    staging_root: &Path,
    mutations: &[TrackedMutation],
  ) -> ReleaseResult<Self> {
    let mut seen = HashSet::new();
    for mutation in mutations {
      if !seen.insert(mutation.original.as_path()) {
        return Err(ReleaseError::message(format!(
          "{} is tracked twice in one overlay",
          mutation.original.display()
        )));
      }
      if mutation
        .original
        .symlink_metadata()
        .is_ok_and(|meta| meta.file_type().is_symlink())
      {
        return Err(ReleaseError::Config(ConfigError::SymlinkedTarget {
          path: mutation.original.clone(),
        }));
      }
      let backup = mutation.backup_path();
      if backup.symlink_metadata().is_ok() {
        return Err(ReleaseError::Config(ConfigError::StaleBackup {
          original: mutation.original.clone(),
          backup,
        }));
      }
    }

    let mut guard = Self {
      pending: pending.clone(),
      installed: Vec::new(),
      staging: None,
      released: false,
    };
    if mutations.is_empty() {
      return Ok(guard);
    }

    let staging = {
      let mut state = pending.lock();
      let dir = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(staging_root)
        .with_context(|| format!("Failed to create staging directory in {}", staging_root.display()))?
        .keep();
      state.temp_dirs.push(dir.clone());
      dir
    };
    guard.staging = Some(staging.clone());

    for (index, mutation) in mutations.iter().enumerate() {
      let staged = staging.join(format!("{}.staged", index));
      fs::write(&staged, &mutation.content).with_context(|| format!("Failed to stage {}", staged.display()))?;
      guard.install_one(mutation, &staged)?;
    }

    tracing::debug!(files = mutations.len(), "overlay installed");
    Ok(guard)
  }

  fn install_one(&mut self, mutation: &TrackedMutation, staged: &Path) -> ReleaseResult<()> {
    let mut state = self.pending.lock();

    let existed = mutation.original.symlink_metadata().is_ok();
    let entry = PendingRestore {
      original: mutation.original.clone(),
      backup: existed.then(|| mutation.backup_path()),
    };

    // Register before mutate
    state.backups.push(entry.clone());
    self.installed.push(entry.clone());

    if entry.backup.is_some() {
      back_up_atomically(&mutation.original)
        .with_context(|| format!("Failed to back up {}", mutation.original.display()))?;
    }
    move_file(staged, &mutation.original)
      .with_context(|| format!("Failed to overlay {}", mutation.original.display()))?;

    Ok(())
  }

  /// Restore originals and remove staging; safe to call more than once
  pub fn restore(&mut self) -> RestoreReport {
    self.released = true;
    let dirs: Vec<PathBuf> = self.staging.iter().cloned().collect();
    let report = {
      let mut state = self.pending.lock();
      restore_locked(&mut state, &self.installed, &dirs)
    };

    // Keep only what failed, so a later call retries exactly those
    let failed: Vec<&PathBuf> = report.warnings.iter().map(|w| &w.path).collect();
    self.installed.retain(|entry| failed.contains(&&entry.original));
    if self.staging.as_ref().is_some_and(|s| report.removed_dirs.contains(s)) {
      self.staging = None;
    }
    report
  }
}

impl Drop for OverlayGuard {
  fn drop(&mut self) {
    if !self.released {
      self.restore().log();
    }
  }
}

/// Overlay `mutations`, run `action`, then restore unconditionally
///
/// The action's result is returned untouched; restoration problems are logged.
pub fn with_overlay<T>(
  pending: &PendingMutations,
  staging_root: &Path,
  mutations: &[TrackedMutation],
  action: impl FnOnce() -> ReleaseResult<T>,
) -> ReleaseResult<T> {
  let mut guard = OverlayGuard::install(pending, staging_root, mutations)?;
  let result = action();
  guard.restore().log();
  result
}

/// Put back originals left behind by a run that was killed outright
///
/// Only originals whose backup exists are touched. Half-written backups next to them
/// and staging directories under `root` are removed.
pub fn recover_stale(root: &Path, originals: &[PathBuf]) -> ReleaseResult<RestoreReport> {
  let mut report = RestoreReport::default();

  for original in originals {
    let partial = partial_backup_path_for(original);
    match fs::remove_file(&partial) {
      Ok(()) => report.discarded.push(partial),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => report.warnings.push(RestorationWarning {
        path: partial,
        reason: e.to_string(),
      }),
    }

    let backup = backup_path_for(original);
    if backup.symlink_metadata().is_err() {
      continue;
    }
    let entry = PendingRestore {
      original: original.clone(),
      backup: Some(backup),
    };
    match restore_entry(&entry) {
      Ok(true) => report.restored.push(original.clone()),
      Ok(false) => {}
      Err(e) => report.warnings.push(RestorationWarning {
        path: original.clone(),
        reason: e.to_string(),
      }),
    }
  }

  let pattern = root.join(format!("{}*", STAGING_PREFIX));
  let mut stale_dirs = Vec::new();
  for entry in glob::glob(&pattern.to_string_lossy())? {
    let dir = entry?;
    if dir.is_dir() {
      stale_dirs.push(dir);
    }
  }
  let mut state = PendingState::default();
  report.merge(restore_locked(&mut state, &[], &stale_dirs));

  Ok(report)
}

fn restore_locked(state: &mut PendingState, entries: &[PendingRestore], dirs: &[PathBuf]) -> RestoreReport {
  let mut report = RestoreReport::default();

  // Last installed, first restored
  for entry in entries.iter().rev() {
    match restore_entry(entry) {
      Ok(changed) => {
        state.backups.retain(|pending| pending != entry);
        if changed {
          report.restored.push(entry.original.clone());
        }
      }
      Err(e) => report.warnings.push(RestorationWarning {
        path: entry.original.clone(),
        reason: e.to_string(),
      }),
    }
  }

  for dir in dirs {
    match fs::remove_dir_all(dir) {
      Ok(()) => report.removed_dirs.push(dir.clone()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => report.removed_dirs.push(dir.clone()),
      Err(e) => {
        report.warnings.push(RestorationWarning {
          path: dir.clone(),
          reason: e.to_string(),
        });
        continue;
      }
    }
    state.temp_dirs.retain(|pending| pending != dir);
  }

  report
}

/// Returns whether anything changed on disk
fn restore_entry(entry: &PendingRestore) -> io::Result<bool> {
  match &entry.backup {
    Some(backup) => {
      if backup.symlink_metadata().is_err() {
        return Ok(false);
      }
      fs::rename(backup, &entry.original)?;
      Ok(true)
    }
    None => match fs::remove_file(&entry.original) {
      Ok(()) => Ok(true),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(e),
    },
  }
}

/// Copy `original` to its backup path through [`partial_backup_path_for`]
fn back_up_atomically(original: &Path) -> io::Result<()> {
  let tmp = partial_backup_path_for(original);
  if let Err(e) = fs::copy(original, &tmp).and_then(|_| fs::rename(&tmp, backup_path_for(original))) {
    let _ = fs::remove_file(&tmp);
    return Err(e);
  }
  Ok(())
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
  match fs::rename(from, to) {
    Ok(()) => Ok(()),
    // Staging on another filesystem
    Err(_) => {
      fs::copy(from, to)?;
      fs::remove_file(from)
    }
  }
}
