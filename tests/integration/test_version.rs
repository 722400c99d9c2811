//! Integration tests for `fork-rail version`

use crate::helpers::{TestRepo, assert_exit, run_fork_rail, stdout_of};
use anyhow::Result;

#[test]
fn test_version_prints_newest_release_tag() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.tag("3.0.0")?;
  repo.tag("3.1.0")?;
  repo.tag("not-a-version")?;

  let output = run_fork_rail(&repo.path, &["version"])?;
  assert_exit(&output, 0);
  assert_eq!(stdout_of(&output).trim(), "3.1.0");
  Ok(())
}

#[test]
fn test_version_strict_skips_dev_tags() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.tag("3.1.0.dev2")?;

  let permissive = run_fork_rail(&repo.path, &["version"])?;
  assert_exit(&permissive, 0);
  assert_eq!(stdout_of(&permissive).trim(), "3.1.0.dev2");

  let strict = run_fork_rail(&repo.path, &["version", "--strict"])?;
  assert_exit(&strict, 2);
  Ok(())
}

#[test]
fn test_version_for_integration_package() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.tag("3.1.0")?;
  repo.tag("prefect-aws-0.5.0")?;

  let output = run_fork_rail(&repo.path, &["version", "--package", "prefect-aws"])?;
  assert_exit(&output, 0);
  assert_eq!(stdout_of(&output).trim(), "0.5.0");
  Ok(())
}
