//! `fork-rail sync`

use crate::commands::open_workspace;
use crate::core::error::ReleaseResult;
use crate::core::sync::{BranchSync, ReleaseUpdate};
use chrono::Local;

/// Reconcile the fork's integration and release branches with upstream
pub fn run_sync(dry_run: bool) -> ReleaseResult<()> {
  let (git, config) = open_workspace()?;
  let mut sync = BranchSync::new(&git, &config.sync);

  if dry_run {
    return sync.preview(Local::now());
  }

  let report = sync.run(Local::now()).inspect_err(|_| {
    eprintln!("❌ Sync stopped after reaching state: {}", sync.state());
  })?;

  println!("\n✅ Sync complete ({})", report.state);
  println!(
    "   Backup:  {}{}",
    report.backup_branch,
    if report.backup_pushed { "" } else { " (local only)" }
  );
  println!("   Main:    +{} commit(s) from upstream", report.main_advanced);
  match report.release {
    ReleaseUpdate::FastForward => println!("   Release: fast-forwarded"),
    ReleaseUpdate::Rebased { replayed } => println!(
      "   Release: {} commit(s) rebased{}",
      replayed,
      if report.force_pushed { ", force-pushed with lease" } else { "" }
    ),
  }
  Ok(())
}
