//! Integration tests for `fork-rail sync`

use crate::helpers::{ForkRemotes, assert_exit, git, run_fork_rail, stdout_of};
use anyhow::Result;

#[test]
fn test_sync_dry_run_changes_nothing() -> Result<()> {
  let remotes = ForkRemotes::new()?;
  remotes.upstream_commit("core.py", "v2\n")?;
  let release_before = remotes.rev(&remotes.fork, "release")?;

  let output = run_fork_rail(&remotes.local, &["sync", "--dry-run"])?;
  assert_exit(&output, 0);
  assert!(stdout_of(&output).contains("Dry-run"));

  assert_eq!(remotes.rev(&remotes.fork, "release")?, release_before);
  assert!(remotes.rev(&remotes.local, "upstream/main").is_err());
  Ok(())
}

#[test]
fn test_sync_rebases_release_onto_upstream() -> Result<()> {
  let remotes = ForkRemotes::new()?;
  remotes.upstream_commit("core.py", "v2\n")?;
  let upstream_tip = remotes.rev(&remotes.upstream_work, "HEAD")?;

  let output = run_fork_rail(&remotes.local, &["sync"])?;
  assert_exit(&output, 0);

  // Fork main mirrors upstream, release sits one commit on top of it
  assert_eq!(remotes.rev(&remotes.fork, "main")?, upstream_tip);
  assert_eq!(remotes.rev(&remotes.fork, "release~1")?, upstream_tip);

  let backups = git(&remotes.fork, &["for-each-ref", "--format=%(refname:short)", "refs/heads/backup"])?;
  let backups = String::from_utf8_lossy(&backups.stdout);
  assert_eq!(backups.lines().count(), 1, "{}", backups);
  assert!(backups.starts_with("backup/release-"));
  Ok(())
}

#[test]
fn test_sync_refuses_dirty_tree() -> Result<()> {
  let remotes = ForkRemotes::new()?;
  remotes.upstream_commit("core.py", "v2\n")?;
  let release_before = remotes.rev(&remotes.fork, "release")?;
  std::fs::write(remotes.local.join("fork.py"), "uncommitted\n")?;

  let output = run_fork_rail(&remotes.local, &["sync"])?;
  assert_exit(&output, 1);
  assert_eq!(remotes.rev(&remotes.fork, "release")?, release_before);
  Ok(())
}

#[test]
fn test_sync_conflict_exits_with_failure() -> Result<()> {
  let remotes = ForkRemotes::new()?;
  // Upstream and the release branch both rewrite fork.py
  remotes.upstream_commit("fork.py", "upstream version\n")?;
  let release_before = remotes.rev(&remotes.fork, "release")?;

  let output = run_fork_rail(&remotes.local, &["sync"])?;
  assert_exit(&output, 1);

  // Nothing rewritten was published
  assert_eq!(remotes.rev(&remotes.fork, "release")?, release_before);
  Ok(())
}
