//! Integration tests for `fork-rail image`

use crate::helpers::{MANIFEST, TestRepo, assert_exit, run_fork_rail, run_fork_rail_with_env, stdout_of};
use anyhow::Result;

const BASE: &str = "us-east1-docker.pkg.dev/acme/images";

#[test]
fn test_image_dry_run_lists_tags_only() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.tag("3.1.0")?;

  let output = run_fork_rail(&repo.path, &["image", "acme", "us-east1", "images", "true"])?;
  assert_exit(&output, 0);

  let stdout = stdout_of(&output);
  assert!(stdout.contains(&format!("{}/prefect:3.1.0-python3.11-conda", BASE)), "{}", stdout);
  assert!(stdout.contains(&format!("{}/prefect-client:3.1.0-python3.12", BASE)));
  assert!(!stdout.contains("prefect-client:3.1.0-python3.12-conda"));
  assert!(!repo.file_exists("images.log"));
  Ok(())
}

#[test]
fn test_image_matrix_without_push() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.tag("3.1.0")?;

  let output = run_fork_rail(&repo.path, &["image", "acme", "us-east1", "images", "false", "true"])?;
  assert_exit(&output, 0);

  // Tool output is passed through, once per build
  assert_eq!(stdout_of(&output).matches("image-tool-ran").count(), 8);

  // server: 2 pythons x 3 flavors, client: standard flavor only
  let builds = repo.log_lines("images.log");
  assert_eq!(builds.len(), 8, "{:?}", builds);
  assert!(builds.iter().all(|b| !b.contains("--push")));
  assert!(builds[0].starts_with("--platform linux/amd64,linux/arm64 --build-arg PYTHON_VERSION=3.11"));
  assert!(builds[0].contains(&format!("-t {}/prefect:3.1.0-python3.11 ", BASE)));
  assert!(builds[7].contains(&format!("-t {}/prefect-client:3.1.0-python3.12 ", BASE)));

  assert_eq!(repo.read_file("pyproject.toml")?, MANIFEST);
  assert!(!repo.file_exists("src/prefect/_build_info.py"));
  Ok(())
}

#[test]
fn test_image_single_python_with_suffix() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.tag("3.1.0")?;

  let output = run_fork_rail(
    &repo.path,
    &["image", "acme", "us-east1", "images", "false", "true", "false", "3.12", "dev"],
  )?;
  assert_exit(&output, 0);

  let builds = repo.log_lines("images.log");
  assert_eq!(builds.len(), 4, "{:?}", builds);
  assert!(builds.iter().all(|b| b.contains("PYTHON_VERSION=3.12")));
  assert!(builds[2].contains(&format!("-t {}/prefect:3.1.0-python3.12-kubernetes-dev ", BASE)));
  Ok(())
}

#[test]
fn test_image_unknown_python_fails_before_building() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.tag("3.1.0")?;

  let output = run_fork_rail(
    &repo.path,
    &["image", "acme", "us-east1", "images", "false", "true", "false", "2.7"],
  )?;
  assert_exit(&output, 1);
  assert!(!repo.file_exists("images.log"));
  Ok(())
}

#[test]
fn test_image_failed_variant_keeps_building() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.tag("3.1.0")?;

  let output = run_fork_rail_with_env(
    &repo.path,
    &["image", "acme", "us-east1", "images", "false", "true"],
    &[("IMAGE_FAIL", "conda")],
  )?;
  assert_exit(&output, 1);

  // Every variant was still attempted
  assert_eq!(repo.log_lines("images.log").len(), 8);
  assert_eq!(repo.read_file("pyproject.toml")?, MANIFEST);
  assert!(!repo.file_exists("src/prefect/_build_info.py"));
  Ok(())
}
