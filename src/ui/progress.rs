//! Progress indicators for long-running operations
//!
//! Uses `linya` bars drawn to stderr, so stdout stays a clean report.

use linya::{Bar, Progress};

/// Progress bar over the attempted targets of a build run
pub struct TargetProgress {
  progress: Progress,
  bar: Bar,
}

impl TargetProgress {
  /// Create a new progress bar for `total` attempted targets
  pub fn new(total: usize, label: impl Into<String>) -> Self {
    let mut progress = Progress::new();
    let bar = progress.bar(total, label.into());
    Self { progress, bar }
  }

  /// Increment progress by 1
  pub fn inc(&mut self) {
    self.progress.inc_and_draw(&self.bar, 1);
  }
}
