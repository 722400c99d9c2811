//! Error types for fork-rail with contextual messages and exit codes
//!
//! Every failure is categorised so the entry point can map it onto the documented
//! exit codes: configuration problems are reported before anything is touched,
//! everything else is critical and propagates after the overlay guard has restored
//! the working tree.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for fork-rail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// Every attempted artifact was built and published
  Success = 0,
  /// Some artifacts failed, the rest were handled (image and sync: any failure)
  Partial = 1,
  /// Bad arguments, bad config, no resolvable version
  Config = 2,
  /// Unexpected failure outside the per-target failure path
  Critical = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for fork-rail
#[derive(Debug)]
pub enum ReleaseError {
  /// Configuration errors
  Config(ConfigError),

  /// Git operation errors
  Git(GitError),

  /// External build/upload/registry tool errors
  Tool(ToolError),

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl ReleaseError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    ReleaseError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      ReleaseError::Message { message, context, help } => ReleaseError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      ReleaseError::Io(e) => ReleaseError::Message {
        message: format!("{}: {}", ctx_str, e),
        context: None,
        help: None,
      },
      _ => self,
    }
  }

  /// Whether this error belongs to the configuration class (exit code 2)
  #[cfg(test)]
  pub fn is_config(&self) -> bool {
    matches!(self, ReleaseError::Config(_))
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      ReleaseError::Config(_) => ExitCode::Config,
      ReleaseError::Git(_) | ReleaseError::Tool(_) | ReleaseError::Io(_) | ReleaseError::Message { .. } => {
        ExitCode::Critical
      }
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      ReleaseError::Config(e) => e.help_message(),
      ReleaseError::Git(e) => e.help_message(),
      ReleaseError::Tool(e) => e.help_message(),
      ReleaseError::Message { help, .. } => help.clone(),
      ReleaseError::Io(_) => None,
    }
  }
}

impl fmt::Display for ReleaseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReleaseError::Config(e) => write!(f, "{}", e),
      ReleaseError::Git(e) => write!(f, "{}", e),
      ReleaseError::Tool(e) => write!(f, "{}", e),
      ReleaseError::Io(e) => write!(f, "I/O error: {}", e),
      ReleaseError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for ReleaseError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ReleaseError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for ReleaseError {
  fn from(err: io::Error) -> Self {
    ReleaseError::Io(err)
  }
}

impl From<String> for ReleaseError {
  fn from(msg: String) -> Self {
    ReleaseError::message(msg)
  }
}

impl From<&str> for ReleaseError {
  fn from(msg: &str) -> Self {
    ReleaseError::message(msg)
  }
}

impl From<toml_edit::TomlError> for ReleaseError {
  fn from(err: toml_edit::TomlError) -> Self {
    ReleaseError::message(format!("TOML parse error: {}", err))
  }
}

impl From<toml_edit::de::Error> for ReleaseError {
  fn from(err: toml_edit::de::Error) -> Self {
    ReleaseError::Config(ConfigError::Invalid {
      reason: format!("TOML deserialization error: {}", err),
    })
  }
}

impl From<serde_json::Error> for ReleaseError {
  fn from(err: serde_json::Error) -> Self {
    ReleaseError::message(format!("JSON error: {}", err))
  }
}

impl From<glob::PatternError> for ReleaseError {
  fn from(err: glob::PatternError) -> Self {
    ReleaseError::message(format!("Invalid glob pattern: {}", err))
  }
}

impl From<glob::GlobError> for ReleaseError {
  fn from(err: glob::GlobError) -> Self {
    ReleaseError::message(format!("Failed to read path while globbing: {}", err))
  }
}

impl From<regex::Error> for ReleaseError {
  fn from(err: regex::Error) -> Self {
    ReleaseError::message(format!("Invalid pattern: {}", err))
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// Missing or empty required input
  MissingField { field: String },

  /// Config file parsed but failed validation
  Invalid { reason: String },

  /// No tag matched the release pattern
  NoReleaseTag {
    pattern: String,
    prefix: Option<String>,
  },

  /// A backup from an interrupted run is still on disk
  StaleBackup { original: PathBuf, backup: PathBuf },

  /// A file to overlay is a symlink, which a backup copy would not preserve
  SymlinkedTarget { path: PathBuf },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::MissingField { .. } => Some("Run `fork-rail <command> --help` to see the expected arguments.".to_string()),
      ConfigError::Invalid { .. } => Some("Check release.toml against the documented sections.".to_string()),
      ConfigError::NoReleaseTag { prefix: Some(prefix), .. } => Some(format!(
        "Create a release tag like `git tag {}1.2.3` or drop --force-strict-version to allow dynamic versioning.",
        prefix
      )),
      ConfigError::NoReleaseTag { prefix: None, .. } => {
        Some("Create a release tag like `git tag 1.2.3` and fetch tags from the fork remote.".to_string())
      }
      ConfigError::StaleBackup { .. } => {
        Some("A previous run was interrupted. Run `fork-rail restore` to put the originals back.".to_string())
      }
      ConfigError::SymlinkedTarget { .. } => {
        Some("Point build_info and manifest in release.toml at the real files.".to_string())
      }
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::MissingField { field } => write!(f, "Missing required input: {}", field),
      ConfigError::Invalid { reason } => write!(f, "Invalid configuration: {}", reason),
      ConfigError::NoReleaseTag { pattern, prefix } => match prefix {
        Some(prefix) => write!(f, "No tag '{}<version>' matches release pattern {}", prefix, pattern),
        None => write!(f, "No tag matches release pattern {}", pattern),
      },
      ConfigError::StaleBackup { original, backup } => write!(
        f,
        "Backup {} already exists for {}",
        backup.display(),
        original.display()
      ),
      ConfigError::SymlinkedTarget { path } => {
        write!(f, "{} is a symlink; only regular files can be overlaid", path.display())
      }
    }
  }
}

/// Git operation errors
#[derive(Debug)]
pub enum GitError {
  /// Git command failed
  CommandFailed { command: String, stderr: String },

  /// Repository not found
  RepoNotFound { path: PathBuf },

  /// Remote not configured
  RemoteMissing { name: String },

  /// Branch does not exist locally
  BranchMissing { name: String },

  /// Working tree has uncommitted changes
  DirtyWorkTree { status: String },

  /// Branch cannot be fast-forwarded
  NotFastForward { branch: String, target: String },

  /// Rebase stopped on a conflict
  RebaseConflict { branch: String, onto: String },

  /// Push failed
  PushFailed {
    remote: String,
    branch: String,
    reason: String,
  },
}

impl GitError {
  fn help_message(&self) -> Option<String> {
    match self {
      GitError::PushFailed { reason, .. } => {
        if reason.contains("stale info") || reason.contains("non-fast-forward") {
          Some("The remote changed since the last fetch. Fetch, inspect, and rerun the sync.".to_string())
        } else {
          None
        }
      }
      GitError::RepoNotFound { path } => Some(format!("Run fork-rail from inside the fork checkout: {}", path.display())),
      GitError::RemoteMissing { name } => Some(format!("Add it with `git remote add {} <url>`.", name)),
      GitError::BranchMissing { name } => Some(format!("Create or fetch the branch first: `git branch {} <start>`.", name)),
      GitError::DirtyWorkTree { .. } => Some("Commit or stash your changes; fork-rail never stashes for you.".to_string()),
      GitError::NotFastForward { branch, .. } => Some(format!(
        "Local '{}' has diverged. Resolve by hand; fork-rail never auto-merges.",
        branch
      )),
      GitError::RebaseConflict { .. } => Some(
        "Resolve the conflicts and run `git rebase --continue`, or `git rebase --abort` to return to the backup state."
          .to_string(),
      ),
      GitError::CommandFailed { .. } => None,
    }
  }
}

impl fmt::Display for GitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitError::CommandFailed { command, stderr } => write!(f, "Git command failed: {}\n{}", command, stderr),
      GitError::RepoNotFound { path } => write!(f, "Git repository not found at: {}", path.display()),
      GitError::RemoteMissing { name } => write!(f, "Git remote '{}' is not configured", name),
      GitError::BranchMissing { name } => write!(f, "Branch '{}' does not exist locally", name),
      GitError::DirtyWorkTree { status } => write!(f, "Working tree has uncommitted changes:\n{}", status),
      GitError::NotFastForward { branch, target } => {
        write!(f, "Cannot fast-forward '{}' to '{}'", branch, target)
      }
      GitError::RebaseConflict { branch, onto } => write!(f, "Rebase of '{}' onto '{}' stopped on a conflict", branch, onto),
      GitError::PushFailed { remote, branch, reason } => write!(f, "Push to {}/{} failed: {}", remote, branch, reason),
    }
  }
}

/// External tool errors
#[derive(Debug)]
pub enum ToolError {
  /// Program not found on PATH
  NotFound { program: String },

  /// Program ran and exited unsuccessfully
  Failed {
    command: String,
    status: Option<i32>,
    stderr: String,
  },
}

impl ToolError {
  fn help_message(&self) -> Option<String> {
    match self {
      ToolError::NotFound { program } => Some(format!(
        "Install '{}' or point [tools] in release.toml at the right executable.",
        program
      )),
      ToolError::Failed { .. } => None,
    }
  }
}

impl fmt::Display for ToolError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ToolError::NotFound { program } => write!(f, "Required tool '{}' not found on PATH", program),
      ToolError::Failed { command, status, stderr } => {
        match status {
          Some(code) => write!(f, "{} exited with status {}", command, code)?,
          None => write!(f, "{} was terminated by a signal", command)?,
        }
        let stderr = stderr.trim();
        if !stderr.is_empty() {
          write!(f, "\n{}", stderr)?;
        }
        Ok(())
      }
    }
  }
}

/// Result type alias for fork-rail
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> ReleaseResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<ReleaseError>,
{
  fn context(self, ctx: impl Into<String>) -> ReleaseResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &ReleaseError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
