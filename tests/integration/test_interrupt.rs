//! Integration tests for signals arriving while files are overlaid

use crate::helpers::{MANIFEST, TestRepo};
use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Marks that it started, then blocks until fork-rail itself has gone away
const BLOCKING_TOOL: &str =
  r#"["sh", "-c", "touch started.log; while kill -0 $PPID 2>/dev/null; do sleep 0.1; done; exit 1", "tool"]"#;

fn spawn_fork_rail(cwd: &Path, args: &[&str]) -> Result<Child> {
  Command::new(env!("CARGO_BIN_EXE_fork-rail"))
    .current_dir(cwd)
    .args(args)
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .spawn()
    .context("Failed to spawn fork-rail")
}

fn wait_until(what: &str, mut ready: impl FnMut() -> bool) -> Result<()> {
  let deadline = Instant::now() + Duration::from_secs(30);
  while !ready() {
    anyhow::ensure!(Instant::now() < deadline, "timed out waiting for {}", what);
    thread::sleep(Duration::from_millis(50));
  }
  Ok(())
}

/// Wait for the build tool to be running over the overlaid tree, then deliver `signal`
fn interrupt_mid_build(repo: &TestRepo, args: &[&str], signal: &str) -> Result<Output> {
  let child = spawn_fork_rail(&repo.path, args)?;

  wait_until("the build tool to start", || repo.file_exists("started.log"))?;
  let overlaid = repo.read_file("pyproject.toml")?;
  assert!(overlaid.contains("version = \"3.1.0\""), "manifest not overlaid: {}", overlaid);
  assert!(repo.file_exists("pyproject.toml.rail-backup"));
  assert!(repo.file_exists("src/prefect/_build_info.py"));

  let status = Command::new("kill")
    .args([signal, &child.id().to_string()])
    .status()
    .context("Failed to run kill")?;
  anyhow::ensure!(status.success(), "kill {} failed", signal);

  child.wait_with_output().context("Failed to wait for fork-rail")
}

/// The tree matches the committed state and no bookkeeping files remain
fn assert_tree_restored(repo: &TestRepo) -> Result<()> {
  assert_eq!(repo.read_file("pyproject.toml")?, MANIFEST);
  assert!(!repo.file_exists("src/prefect/_build_info.py"));

  let leftovers: Vec<String> = walk(&repo.path)?
    .into_iter()
    .filter(|name| name.contains(".rail-backup") || name.contains(".rail-stage-"))
    .collect();
  assert!(leftovers.is_empty(), "left behind: {:?}", leftovers);
  Ok(())
}

fn walk(dir: &Path) -> Result<Vec<String>> {
  let mut names = Vec::new();
  for entry in std::fs::read_dir(dir)? {
    let path = entry?.path();
    if path.file_name().is_some_and(|n| n == ".git") {
      continue;
    }
    names.push(path.display().to_string());
    if path.is_dir() {
      names.extend(walk(&path)?);
    }
  }
  Ok(names)
}

fn assert_interrupted(output: &Output, expected: i32) {
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert_eq!(output.status.code(), Some(expected), "stderr: {}", stderr);
  assert!(stderr.contains("Interrupted: restored 2 file(s)"), "stderr: {}", stderr);
}

#[test]
fn test_sigterm_during_package_build_restores_and_exits_143() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.tag("3.1.0")?;
  repo.set_tool("package_build", BLOCKING_TOOL)?;

  let output = interrupt_mid_build(&repo, &["package", "acme", "us-east1", "pypi", "false"], "-TERM")?;
  assert_interrupted(&output, 143);
  assert_tree_restored(&repo)?;
  assert!(!repo.file_exists("uploads.log"));
  Ok(())
}

#[test]
fn test_sigint_during_image_build_restores_and_exits_130() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.tag("3.1.0")?;
  repo.set_tool("image_build", BLOCKING_TOOL)?;

  let output = interrupt_mid_build(&repo, &["image", "acme", "us-east1", "images", "false", "true"], "-INT")?;
  assert_interrupted(&output, 130);
  assert_tree_restored(&repo)?;
  Ok(())
}
