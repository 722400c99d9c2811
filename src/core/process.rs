//! External tool invocation
//!
//! Build backends, upload clients and the registry CLI are collaborators reached only
//! through their command lines. Every call goes through [`ToolRunner`] so the release
//! flows can be exercised with a recording runner in tests.

use crate::core::error::{ReleaseError, ReleaseResult, ResultExt, ToolError};
use std::env;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// One command line to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: PathBuf,
}

impl Invocation {
  /// Build an invocation from a configured argv prefix
  pub fn from_argv(argv: &[String], cwd: &Path) -> ReleaseResult<Self> {
    let (program, args) = argv
      .split_first()
      .ok_or_else(|| ReleaseError::message("Tool command line is empty"))?;
    Ok(Self {
      program: program.clone(),
      args: args.to_vec(),
      cwd: cwd.to_path_buf(),
    })
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  /// Shell-like rendering for logs and dry-run output
  pub fn display(&self) -> String {
    let mut rendered = self.program.clone();
    for arg in &self.args {
      rendered.push(' ');
      if arg.is_empty() || arg.contains(char::is_whitespace) {
        rendered.push_str(&format!("'{}'", arg));
      } else {
        rendered.push_str(arg);
      }
    }
    rendered
  }
}

/// Result of a finished tool; stdout went straight to the terminal
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
  pub status: Option<i32>,
  pub stderr: String,
}

impl ToolOutput {
  pub fn success(&self) -> bool {
    self.status == Some(0)
  }
}

/// Runs external tools to completion (no timeout)
pub trait ToolRunner {
  fn run(&self, invocation: &Invocation) -> ReleaseResult<ToolOutput>;

  /// Run and turn a non-zero exit into a [`ToolError::Failed`]
  fn run_checked(&self, invocation: &Invocation) -> ReleaseResult<ToolOutput> {
    let output = self.run(invocation)?;
    if output.success() {
      Ok(output)
    } else {
      Err(ReleaseError::Tool(ToolError::Failed {
        command: invocation.display(),
        status: output.status,
        stderr: output.stderr,
      }))
    }
  }
}

/// Runs tools as child processes of this one
///
/// Stdout is inherited so long builds show progress as they go. Stderr is echoed line
/// by line and also kept for the error report.
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
  fn run(&self, invocation: &Invocation) -> ReleaseResult<ToolOutput> {
    tracing::debug!(cwd = %invocation.cwd.display(), command = %invocation.display(), "running tool");

    let mut child = Command::new(&invocation.program)
      .args(&invocation.args)
      .current_dir(&invocation.cwd)
      .stdout(Stdio::inherit())
      .stderr(Stdio::piped())
      .spawn()
      .with_context(|| format!("Failed to execute {}", invocation.program))?;

    let stderr = child.stderr.take().map(tee_stderr).unwrap_or_default();
    let status = child
      .wait()
      .with_context(|| format!("Failed to wait for {}", invocation.program))?;

    let result = ToolOutput {
      status: status.code(),
      stderr,
    };
    tracing::debug!(status = ?result.status, "tool finished");
    Ok(result)
  }
}

/// Echo a child's stderr to ours until it closes, returning what was read
fn tee_stderr(pipe: impl Read) -> String {
  let mut reader = BufReader::new(pipe);
  let mut captured = String::new();
  let mut line = Vec::new();
  while reader.read_until(b'\n', &mut line).unwrap_or(0) > 0 {
    let text = String::from_utf8_lossy(&line);
    eprint!("{}", text);
    captured.push_str(&text);
    line.clear();
  }
  captured
}

/// Locate a program the way the OS would when spawning it
pub fn find_program(program: &str) -> Option<PathBuf> {
  let candidate = Path::new(program);
  if candidate.components().count() > 1 {
    return candidate.is_file().then(|| candidate.to_path_buf());
  }

  let path = env::var_os("PATH")?;
  env::split_paths(&path).map(|dir| dir.join(program)).find(|p| p.is_file())
}

/// Fail with [`ToolError::NotFound`] for the first configured program missing from PATH
pub fn require_programs<'a>(argvs: impl IntoIterator<Item = &'a [String]>) -> ReleaseResult<()> {
  for argv in argvs {
    let Some(program) = argv.first() else {
      continue;
    };
    if find_program(program).is_none() {
      return Err(ReleaseError::Tool(ToolError::NotFound {
        program: program.clone(),
      }));
    }
  }
  Ok(())
}
