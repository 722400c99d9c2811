//! Multi-target build driver
//!
//! Runs one action per target in enumeration order. A failing target is recorded and
//! the loop moves on; statically skipped targets are never attempted and do not count
//! towards the total.

use crate::core::error::ReleaseResult;
use crate::release::targets::BuildTarget;
use crate::ui::progress::TargetProgress;
use std::io::IsTerminal;

/// Outcome of one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildResult {
  Succeeded,
  Failed(String),
  Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
  pub label: String,
  pub result: BuildResult,
}

/// Overall verdict of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
  Success,
  Partial,
  Failed,
}

impl RunStatus {
  /// Status for `failed` failures out of `attempted` attempts
  ///
  /// A run with nothing to attempt has nothing that failed.
  pub fn from_counts(attempted: usize, failed: usize) -> Self {
    if failed == 0 {
      RunStatus::Success
    } else if failed >= attempted {
      RunStatus::Failed
    } else {
      RunStatus::Partial
    }
  }
}

/// Per-target results of a run, in enumeration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
  pub outcomes: Vec<TargetOutcome>,
}

impl Summary {
  /// Targets that were tried (skips excluded)
  pub fn attempted(&self) -> usize {
    self
      .outcomes
      .iter()
      .filter(|o| !matches!(o.result, BuildResult::Skipped(_)))
      .count()
  }

  pub fn succeeded(&self) -> usize {
    self
      .outcomes
      .iter()
      .filter(|o| o.result == BuildResult::Succeeded)
      .count()
  }

  pub fn failed(&self) -> Vec<&TargetOutcome> {
    self
      .outcomes
      .iter()
      .filter(|o| matches!(o.result, BuildResult::Failed(_)))
      .collect()
  }

  pub fn skipped(&self) -> Vec<&TargetOutcome> {
    self
      .outcomes
      .iter()
      .filter(|o| matches!(o.result, BuildResult::Skipped(_)))
      .collect()
  }

  /// Whether the target with this label succeeded
  pub fn is_success(&self, label: &str) -> bool {
    self
      .outcomes
      .iter()
      .any(|o| o.label == label && o.result == BuildResult::Succeeded)
  }

  pub fn status(&self) -> RunStatus {
    RunStatus::from_counts(self.attempted(), self.failed().len())
  }

  /// Print the `successful/total` report
  pub fn print_report(&self, title: &str) {
    println!("\n📊 {}: {}/{} succeeded", title, self.succeeded(), self.attempted());
    for outcome in &self.outcomes {
      match &outcome.result {
        BuildResult::Succeeded => println!("   ✅ {}", outcome.label),
        BuildResult::Failed(reason) => println!("   ❌ {}: {}", outcome.label, reason),
        BuildResult::Skipped(reason) => println!("   ⏭️  {} (skipped: {})", outcome.label, reason),
      }
    }
  }
}

/// Build every target, collecting results without stopping at failures
pub fn build_all<T, F>(targets: &[T], mut build_one: F) -> Summary
where
  T: BuildTarget,
  F: FnMut(&T) -> ReleaseResult<()>,
{
  let attempted = targets.iter().filter(|t| t.skip_reason().is_none()).count();
  let show_progress = attempted > 1 && std::io::stderr().is_terminal();
  let mut progress = show_progress.then(|| TargetProgress::new(attempted, "Building"));
  let mut summary = Summary::default();

  for target in targets {
    let label = target.label();

    if let Some(reason) = target.skip_reason() {
      tracing::debug!(target = %label, %reason, "skipping incompatible target");
      summary.outcomes.push(TargetOutcome {
        label,
        result: BuildResult::Skipped(reason),
      });
      continue;
    }

    tracing::info!(target = %label, "building");
    let result = match build_one(target) {
      Ok(()) => BuildResult::Succeeded,
      Err(e) => {
        tracing::warn!(target = %label, error = %e, "target failed");
        BuildResult::Failed(e.to_string())
      }
    };
    summary.outcomes.push(TargetOutcome { label, result });

    if let Some(progress) = progress.as_mut() {
      progress.inc();
    }
  }

  summary
}

/// What a run would do, computed without touching anything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preview {
  pub attempted: Vec<String>,
  pub skipped: Vec<(String, String)>,
}

pub fn preview<T: BuildTarget>(targets: &[T]) -> Preview {
  let mut preview = Preview::default();
  for target in targets {
    match target.skip_reason() {
      Some(reason) => preview.skipped.push((target.label(), reason)),
      None => preview.attempted.push(target.label()),
    }
  }
  preview
}

impl Preview {
  pub fn print(&self) {
    println!("\n📋 {} target(s) would be built:", self.attempted.len());
    for label in &self.attempted {
      println!("   🔨 {}", label);
    }
    if !self.skipped.is_empty() {
      println!("\n⏭️  {} target(s) skipped:", self.skipped.len());
      for (label, reason) in &self.skipped {
        println!("   {} ({})", label, reason);
      }
    }
  }
}
