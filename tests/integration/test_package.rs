//! Integration tests for `fork-rail package`

use crate::helpers::{MANIFEST, TestRepo, assert_exit, run_fork_rail, stdout_of};
use anyhow::Result;

const INDEX: &str = "https://us-east1-python.pkg.dev/acme/pypi/";

#[test]
fn test_package_dry_run_leaves_tree_untouched() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.tag("3.1.0")?;

  let output = run_fork_rail(&repo.path, &["package", "acme", "us-east1", "pypi", "true", "true", "false"])?;
  assert_exit(&output, 0);

  let stdout = stdout_of(&output);
  assert!(stdout.contains("3.1.0"), "version not reported: {}", stdout);
  assert!(stdout.contains(INDEX));
  assert!(!repo.file_exists("dist"));
  assert!(!repo.file_exists("uploads.log"));
  assert!(!repo.file_exists("src/prefect/_build_info.py"));
  assert_eq!(repo.read_file("pyproject.toml")?, MANIFEST);
  Ok(())
}

#[test]
fn test_package_strict_without_release_tag_is_config_error() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.tag("3.1.0.dev1")?;

  let output = run_fork_rail(&repo.path, &["package", "acme", "us-east1", "pypi", "false", "false", "true"])?;
  assert_exit(&output, 2);
  assert!(!repo.file_exists("dist"));
  Ok(())
}

#[test]
fn test_package_builds_and_uploads_pinned_versions() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.add_integration("prefect-aws")?;
  repo.commit("Add aws integration")?;
  repo.tag("3.1.0")?;
  repo.tag("prefect-aws-0.5.0")?;

  let output = run_fork_rail(&repo.path, &["package", "acme", "us-east1", "pypi"])?;
  assert_exit(&output, 0);

  // The build tool saw pinned manifests
  let primary = repo.read_file("dist/fork.txt")?;
  assert!(primary.contains("version = \"3.1.0\""), "{}", primary);
  assert!(!primary.contains("dynamic"));
  let aws = repo.read_file("dist/integrations/prefect-aws.txt")?;
  assert!(aws.contains("version = \"0.5.0\""), "{}", aws);

  // ...and the tree is back to its committed state afterwards
  assert_eq!(repo.read_file("pyproject.toml")?, MANIFEST);
  assert!(!repo.file_exists("src/prefect/_build_info.py"));
  assert!(!repo.file_exists("pyproject.toml.rail-backup"));
  assert!(!repo.file_exists("src/integrations/prefect-aws/prefect_aws/_build_info.py"));

  let uploads = repo.log_lines("uploads.log");
  assert_eq!(uploads.len(), 2, "{:?}", uploads);
  assert!(uploads[0].starts_with(&format!("--repository-url {}", INDEX)));
  assert!(uploads[0].ends_with("dist/fork.txt"));
  assert!(uploads[1].ends_with("dist/integrations/prefect-aws.txt"));
  Ok(())
}

#[test]
fn test_package_failed_integration_is_partial() -> Result<()> {
  let repo = TestRepo::new()?;
  let aws = repo.add_integration("prefect-aws")?;
  repo.commit("Add aws integration")?;
  repo.tag("3.1.0")?;
  repo.tag("prefect-aws-0.5.0")?;
  let committed = repo.read_file("src/integrations/prefect-aws/pyproject.toml")?;
  std::fs::write(aws.join("FAIL"), "")?;

  let output = run_fork_rail(&repo.path, &["package", "acme", "us-east1", "pypi"])?;
  assert_exit(&output, 1);

  assert_eq!(repo.read_file("src/integrations/prefect-aws/pyproject.toml")?, committed);
  assert_eq!(repo.read_file("pyproject.toml")?, MANIFEST);

  // Only the primary distributions were uploaded
  let uploads = repo.log_lines("uploads.log");
  assert_eq!(uploads.len(), 1, "{:?}", uploads);
  assert!(uploads[0].ends_with("dist/fork.txt"));
  Ok(())
}

#[test]
fn test_package_every_build_failing_is_critical() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.tag("3.1.0")?;
  std::fs::write(repo.path.join("FAIL"), "")?;

  let output = run_fork_rail(&repo.path, &["package", "acme", "us-east1", "pypi", "false"])?;
  assert_exit(&output, 3);

  assert_eq!(repo.read_file("pyproject.toml")?, MANIFEST);
  assert!(!repo.file_exists("src/prefect/_build_info.py"));
  assert!(!repo.file_exists("uploads.log"));
  Ok(())
}

#[test]
fn test_package_refuses_to_run_over_stale_backup() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.tag("3.1.0")?;
  std::fs::write(repo.path.join("pyproject.toml.rail-backup"), MANIFEST)?;

  let output = run_fork_rail(&repo.path, &["package", "acme", "us-east1", "pypi"])?;
  assert_exit(&output, 2);
  assert!(!repo.file_exists("dist"));
  assert!(repo.file_exists("pyproject.toml.rail-backup"));
  Ok(())
}

#[test]
fn test_package_rejects_bad_registry_coordinates() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.tag("3.1.0")?;

  let output = run_fork_rail(&repo.path, &["package", "acme/evil", "us-east1", "pypi"])?;
  assert_exit(&output, 2);
  Ok(())
}
