//! Branch reconciliation between the upstream project and the fork
//!
//! The sync moves through fixed states:
//!
//! ```text
//! Validating → BackedUp → MainSynced → ReleaseSynced → Done
//! ```
//!
//! Any unmet precondition stops the run in the state it reached. The local
//! integration branch only ever fast-forwards to the upstream tip; the fork's
//! release-only commits are replayed on top of it, and the release branch is
//! force-pushed (with lease) only when that replay rewrote it.

use crate::core::config::SyncConfig;
use crate::core::error::{GitError, ReleaseError, ReleaseResult};
use crate::core::vcs::SystemGit;
use chrono::{DateTime, Local};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncState {
  Validating,
  BackedUp,
  MainSynced,
  ReleaseSynced,
  Done,
}

impl fmt::Display for SyncState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      SyncState::Validating => "validating",
      SyncState::BackedUp => "backed up",
      SyncState::MainSynced => "main synced",
      SyncState::ReleaseSynced => "release synced",
      SyncState::Done => "done",
    };
    f.write_str(name)
  }
}

/// How the release branch caught up with the new integration tip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseUpdate {
  /// No release-only commits; moved to the integration tip
  FastForward,
  /// Release-only commits replayed on the integration tip
  Rebased { replayed: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
  pub state: SyncState,
  pub backup_branch: String,
  /// Whether the backup branch reached the fork remote
  pub backup_pushed: bool,
  /// Commits the integration branch advanced by
  pub main_advanced: usize,
  pub release: ReleaseUpdate,
  /// Release branch was rewritten and force-pushed with lease
  pub force_pushed: bool,
}

/// Name of the timestamped backup branch for `release`
pub fn backup_branch_name(prefix: &str, release: &str, now: DateTime<Local>) -> String {
  format!("{}/{}-{}", prefix, release, now.format("%Y%m%d-%H%M%S"))
}

pub struct BranchSync<'a> {
  git: &'a SystemGit,
  config: &'a SyncConfig,
  state: SyncState,
}

impl<'a> BranchSync<'a> {
  pub fn new(git: &'a SystemGit, config: &'a SyncConfig) -> Self {
    Self {
      git,
      config,
      state: SyncState::Validating,
    }
  }

  /// State reached so far
  pub fn state(&self) -> SyncState {
    self.state
  }

  fn upstream_tip(&self) -> String {
    format!("{}/{}", self.config.upstream_remote, self.config.main_branch)
  }

  /// Check every precondition; nothing is modified
  pub fn validate(&self) -> ReleaseResult<()> {
    let cfg = self.config;
    for remote in [&cfg.upstream_remote, &cfg.fork_remote] {
      if !self.git.has_remote(remote)? {
        return Err(ReleaseError::Git(GitError::RemoteMissing { name: remote.clone() }));
      }
    }
    if !self.git.branch_exists(&cfg.release_branch)? {
      return Err(ReleaseError::Git(GitError::BranchMissing {
        name: cfg.release_branch.clone(),
      }));
    }
    if let Some(status) = self.git.uncommitted_changes()? {
      return Err(ReleaseError::Git(GitError::DirtyWorkTree { status }));
    }
    Ok(())
  }

  /// Print what a sync would do from the refs already fetched
  pub fn preview(&self, now: DateTime<Local>) -> ReleaseResult<()> {
    self.validate()?;
    let cfg = self.config;
    let upstream = self.upstream_tip();

    println!("🔍 Dry-run mode (no fetch, no branch or remote changes)");
    println!(
      "   Backup:  {} at {}",
      backup_branch_name(&cfg.backup_prefix, &cfg.release_branch, now),
      cfg.release_branch
    );

    if self.git.resolve(&upstream)?.is_none() {
      println!("   {} has not been fetched yet; run without --dry-run to fetch it", upstream);
      return Ok(());
    }

    if self.git.branch_exists(&cfg.main_branch)? {
      if self.git.is_ancestor(&cfg.main_branch, &upstream)? {
        let behind = self.git.count_commits(&cfg.main_branch, &upstream)?;
        println!("   Main:    fast-forward {} by {} commit(s)", cfg.main_branch, behind);
      } else {
        println!("   Main:    ❌ {} has diverged from {}; sync would stop here", cfg.main_branch, upstream);
        return Ok(());
      }
    } else {
      println!("   Main:    create {} at {}", cfg.main_branch, upstream);
    }

    let release_only = self.git.count_commits(&upstream, &cfg.release_branch)?;
    if release_only == 0 {
      println!("   Release: fast-forward {} to {}", cfg.release_branch, upstream);
    } else {
      println!(
        "   Release: rebase {} release-only commit(s) onto {}",
        release_only, upstream
      );
    }
    println!("   Push:    {} and {} to {}, then tags", cfg.main_branch, cfg.release_branch, cfg.fork_remote);
    Ok(())
  }

  /// Run the full sync
  pub fn run(&mut self, now: DateTime<Local>) -> ReleaseResult<SyncReport> {
    let cfg = self.config;

    println!("🔎 Validating repository...");
    self.validate()?;

    println!("📥 Fetching remotes...");
    self.git.fetch_from_remote(&cfg.upstream_remote)?;
    self.git.fetch_from_remote(&cfg.fork_remote)?;

    let (backup_branch, backup_pushed) = self.back_up(now)?;
    self.state = SyncState::BackedUp;
    tracing::info!(state = %self.state, branch = %backup_branch, "backup created");

    let main_advanced = self.sync_main()?;
    self.state = SyncState::MainSynced;
    tracing::info!(state = %self.state, commits = main_advanced, "integration branch synced");

    let before = self.git.require_rev(&cfg.release_branch)?;
    let release = self.sync_release()?;
    let rewritten = self.git.require_rev(&cfg.release_branch)? != before
      && matches!(release, ReleaseUpdate::Rebased { .. });
    self.state = SyncState::ReleaseSynced;
    tracing::info!(state = %self.state, ?release, rewritten, "release branch synced");

    self.publish(rewritten)?;
    self.state = SyncState::Done;

    Ok(SyncReport {
      state: self.state,
      backup_branch,
      backup_pushed,
      main_advanced,
      release,
      force_pushed: rewritten,
    })
  }

  fn back_up(&self, now: DateTime<Local>) -> ReleaseResult<(String, bool)> {
    let cfg = self.config;
    let name = backup_branch_name(&cfg.backup_prefix, &cfg.release_branch, now);

    println!("💾 Backing up {} to {}", cfg.release_branch, name);
    self.git.create_branch_at(&name, &cfg.release_branch)?;

    let pushed = match self.git.push_branch(&cfg.fork_remote, &name) {
      Ok(()) => true,
      Err(e) => {
        println!("   ⚠️  Backup branch kept locally only: {}", e);
        tracing::warn!(branch = %name, error = %e, "backup push failed");
        false
      }
    };
    Ok((name, pushed))
  }

  fn sync_main(&self) -> ReleaseResult<usize> {
    let cfg = self.config;
    let upstream = self.upstream_tip();
    self.git.require_rev(&upstream)?;

    if !self.git.branch_exists(&cfg.main_branch)? {
      println!("🌱 Creating {} at {}", cfg.main_branch, upstream);
      self.git.create_branch_at(&cfg.main_branch, &upstream)?;
      return Ok(0);
    }

    if !self.git.is_ancestor(&cfg.main_branch, &upstream)? {
      return Err(ReleaseError::Git(GitError::NotFastForward {
        branch: cfg.main_branch.clone(),
        target: upstream,
      }));
    }

    let behind = self.git.count_commits(&cfg.main_branch, &upstream)?;
    println!("⏩ Fast-forwarding {} by {} commit(s)", cfg.main_branch, behind);
    self.git.checkout_branch(&cfg.main_branch)?;
    self.git.merge_ff_only(&cfg.main_branch, &upstream)?;
    Ok(behind)
  }

  fn sync_release(&self) -> ReleaseResult<ReleaseUpdate> {
    let cfg = self.config;
    let release_only = self.git.count_commits(&cfg.main_branch, &cfg.release_branch)?;

    self.git.checkout_branch(&cfg.release_branch)?;
    if release_only == 0 {
      println!("⏩ Fast-forwarding {} to {}", cfg.release_branch, cfg.main_branch);
      self.git.merge_ff_only(&cfg.release_branch, &cfg.main_branch)?;
      return Ok(ReleaseUpdate::FastForward);
    }

    println!(
      "🔁 Rebasing {} release-only commit(s) of {} onto {}",
      release_only, cfg.release_branch, cfg.main_branch
    );
    self.git.rebase(&cfg.release_branch, &cfg.main_branch)?;
    Ok(ReleaseUpdate::Rebased { replayed: release_only })
  }

  fn publish(&self, rewritten: bool) -> ReleaseResult<()> {
    let cfg = self.config;
    println!("📤 Pushing to {}...", cfg.fork_remote);

    self.git.push_branch(&cfg.fork_remote, &cfg.main_branch)?;

    let remote_release = format!("{}/{}", cfg.fork_remote, cfg.release_branch);
    match (rewritten, self.git.resolve(&remote_release)?) {
      (true, Some(expected)) => {
        self
          .git
          .push_force_with_lease(&cfg.fork_remote, &cfg.release_branch, &expected)?
      }
      _ => self.git.push_branch(&cfg.fork_remote, &cfg.release_branch)?,
    }

    self.git.push_tags(&cfg.fork_remote)?;
    Ok(())
  }
}
