//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Manifest of the primary package, version supplied at build time
pub const MANIFEST: &str = r#"[project]
name = "prefect"
# filled in by the release tooling
dynamic = ["version"]
"#;

/// Tool stand-ins: builds copy the manifest they see into the output directory,
/// uploads and image builds append their arguments to a log in the repo root.
/// Image builds also print `image-tool-ran` to stdout.
/// A `FAIL` file in the build directory fails that build; image builds whose
/// arguments contain `$IMAGE_FAIL` fail.
const RELEASE_TOML: &str = r#"
[tools]
package_build = ["sh", "-c", "[ ! -f FAIL ] && mkdir -p \"$2\" && cp pyproject.toml \"$2/$(basename \"$PWD\").txt\"", "build"]
package_upload = ["sh", "-c", "echo \"$@\" >> uploads.log", "upload"]
image_build = ["sh", "-c", "echo \"$@\" >> images.log; echo image-tool-ran; if [ -n \"$IMAGE_FAIL\" ]; then case \"$*\" in *\"$IMAGE_FAIL\"*) exit 1;; esac; fi", "image"]

[images]
python_versions = ["3.11", "3.12"]

[registry]
ensure_repository = false
configure_docker_auth = false
"#;

/// A fork checkout with a primary package and release tooling config
pub struct TestRepo {
  _root: TempDir,
  pub path: PathBuf,
}

impl TestRepo {
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().join("fork");
    std::fs::create_dir_all(path.join("src/prefect"))?;

    git(&path, &["init", "--initial-branch=main"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;

    std::fs::write(path.join("pyproject.toml"), MANIFEST)?;
    std::fs::write(path.join("src/prefect/__init__.py"), "")?;
    std::fs::write(path.join("release.toml"), RELEASE_TOML)?;
    std::fs::write(path.join(".gitignore"), "dist/\n*.log\n")?;

    git(&path, &["add", "."])?;
    git(&path, &["commit", "-m", "Initial fork layout"])?;

    Ok(Self { _root: root, path })
  }

  /// Add an integration package under src/integrations/<name>
  pub fn add_integration(&self, name: &str) -> Result<PathBuf> {
    let dir = self.path.join("src/integrations").join(name);
    std::fs::create_dir_all(dir.join(name.replace('-', "_")))?;
    std::fs::write(
      dir.join("pyproject.toml"),
      format!("[project]\nname = \"{}\"\ndynamic = [\"version\"]\n", name),
    )?;
    Ok(dir)
  }

  /// Replace one `[tools]` entry of the release config, e.g. `("package_build", r#"["sh", "-c", "exit 1"]"#)`
  pub fn set_tool(&self, key: &str, argv: &str) -> Result<()> {
    let config = self.read_file("release.toml")?;
    let prefix = format!("{} = ", key);
    let updated: Vec<String> = config
      .lines()
      .map(|line| {
        if line.starts_with(&prefix) {
          format!("{}{}", prefix, argv)
        } else {
          line.to_string()
        }
      })
      .collect();
    anyhow::ensure!(updated.iter().any(|l| l.starts_with(&prefix)), "no tool named {}", key);
    std::fs::write(self.path.join("release.toml"), updated.join("\n") + "\n")?;
    Ok(())
  }

  pub fn commit(&self, message: &str) -> Result<()> {
    git(&self.path, &["add", "."])?;
    git(&self.path, &["commit", "-m", message])?;
    Ok(())
  }

  pub fn tag(&self, name: &str) -> Result<()> {
    git(&self.path, &["tag", name])?;
    Ok(())
  }

  pub fn file_exists(&self, path: &str) -> bool {
    self.path.join(path).exists()
  }

  pub fn read_file(&self, path: &str) -> Result<String> {
    Ok(std::fs::read_to_string(self.path.join(path))?)
  }

  /// Contents of a log written by the tool stand-ins, one line per call
  pub fn log_lines(&self, name: &str) -> Vec<String> {
    self
      .read_file(name)
      .map(|content| content.lines().map(String::from).collect())
      .unwrap_or_default()
  }
}

/// Bare upstream and fork remotes plus a local clone of the fork with a release branch
pub struct ForkRemotes {
  _root: TempDir,
  pub upstream_work: PathBuf,
  pub fork: PathBuf,
  pub local: PathBuf,
}

impl ForkRemotes {
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let upstream = root.path().join("upstream.git");
    let fork = root.path().join("fork.git");
    let upstream_work = root.path().join("upstream-work");
    let local = root.path().join("local");

    git(root.path(), &["init", "--bare", "--initial-branch=main", path_str(&upstream)?])?;
    git(root.path(), &["clone", path_str(&upstream)?, path_str(&upstream_work)?])?;
    identity(&upstream_work)?;
    git(&upstream_work, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
    commit_file(&upstream_work, "core.py", "v1\n", "upstream: initial")?;
    git(&upstream_work, &["push", "origin", "main"])?;

    git(root.path(), &["clone", "--bare", path_str(&upstream)?, path_str(&fork)?])?;
    git(root.path(), &["clone", path_str(&fork)?, path_str(&local)?])?;
    identity(&local)?;
    git(&local, &["remote", "add", "upstream", path_str(&upstream)?])?;
    git(&local, &["checkout", "-b", "release"])?;
    commit_file(&local, "fork.py", "fork patch\n", "fork: release-only change")?;
    git(&local, &["push", "origin", "release"])?;

    Ok(Self {
      _root: root,
      upstream_work,
      fork,
      local,
    })
  }

  /// Land a commit on upstream's main
  pub fn upstream_commit(&self, file: &str, content: &str) -> Result<()> {
    commit_file(&self.upstream_work, file, content, "upstream: change")?;
    git(&self.upstream_work, &["push", "origin", "main"])?;
    Ok(())
  }

  pub fn rev(&self, repo: &Path, rev: &str) -> Result<String> {
    let output = git(repo, &["rev-parse", rev])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }
}

fn identity(repo: &Path) -> Result<()> {
  git(repo, &["config", "user.name", "Test User"])?;
  git(repo, &["config", "user.email", "test@example.com"])?;
  Ok(())
}

fn commit_file(repo: &Path, file: &str, content: &str, message: &str) -> Result<()> {
  std::fs::write(repo.join(file), content)?;
  git(repo, &["add", file])?;
  git(repo, &["commit", "-m", message])?;
  Ok(())
}

fn path_str(path: &Path) -> Result<&str> {
  path.to_str().context("Temp path is not UTF-8")
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

/// Run fork-rail and return its output whatever the exit status
pub fn run_fork_rail(cwd: &Path, args: &[&str]) -> Result<Output> {
  run_fork_rail_with_env(cwd, args, &[])
}

pub fn run_fork_rail_with_env(cwd: &Path, args: &[&str], env: &[(&str, &str)]) -> Result<Output> {
  let fork_rail_bin = env!("CARGO_BIN_EXE_fork-rail");

  Command::new(fork_rail_bin)
    .current_dir(cwd)
    .args(args)
    .envs(env.iter().copied())
    .output()
    .context("Failed to run fork-rail")
}

pub fn stdout_of(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).to_string()
}

/// Assert the process exit code, showing its output on mismatch
pub fn assert_exit(output: &Output, expected: i32) {
  assert_eq!(
    output.status.code(),
    Some(expected),
    "unexpected exit code\nstdout: {}\nstderr: {}",
    String::from_utf8_lossy(&output.stdout),
    String::from_utf8_lossy(&output.stderr)
  );
}
