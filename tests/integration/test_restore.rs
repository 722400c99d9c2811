//! Integration tests for `fork-rail restore`

use crate::helpers::{MANIFEST, TestRepo, assert_exit, run_fork_rail, stdout_of};
use anyhow::Result;

#[test]
fn test_restore_puts_back_backups_from_killed_run() -> Result<()> {
  let repo = TestRepo::new()?;
  let aws = repo.add_integration("prefect-aws")?;
  let aws_manifest = repo.read_file("src/integrations/prefect-aws/pyproject.toml")?;

  // What a run killed mid-build leaves behind
  std::fs::write(repo.path.join("pyproject.toml.rail-backup"), MANIFEST)?;
  std::fs::write(repo.path.join("pyproject.toml"), "[project]\nversion = \"3.1.0\"\n")?;
  std::fs::write(aws.join("pyproject.toml.rail-backup"), &aws_manifest)?;
  std::fs::write(aws.join("pyproject.toml"), "[project]\nversion = \"0.5.0\"\n")?;
  std::fs::create_dir_all(repo.path.join(".rail-stage-abc123"))?;
  std::fs::write(repo.path.join(".rail-stage-abc123/_build_info.py"), "")?;

  let output = run_fork_rail(&repo.path, &["restore"])?;
  assert_exit(&output, 0);
  assert!(stdout_of(&output).contains("Restored 2 file(s)"));

  assert_eq!(repo.read_file("pyproject.toml")?, MANIFEST);
  assert_eq!(repo.read_file("src/integrations/prefect-aws/pyproject.toml")?, aws_manifest);
  assert!(!repo.file_exists("pyproject.toml.rail-backup"));
  assert!(!repo.file_exists("src/integrations/prefect-aws/pyproject.toml.rail-backup"));
  assert!(!repo.file_exists(".rail-stage-abc123"));
  Ok(())
}

#[test]
fn test_restore_on_clean_tree_is_a_no_op() -> Result<()> {
  let repo = TestRepo::new()?;

  let output = run_fork_rail(&repo.path, &["restore"])?;
  assert_exit(&output, 0);
  assert!(stdout_of(&output).contains("Nothing to restore"));
  assert_eq!(repo.read_file("pyproject.toml")?, MANIFEST);
  Ok(())
}

#[test]
fn test_restore_discards_half_written_backup() -> Result<()> {
  let repo = TestRepo::new()?;
  // Killed while the backup copy was being written; the manifest itself was never replaced
  std::fs::write(repo.path.join("pyproject.toml.rail-backup.tmp"), "[proj")?;

  let output = run_fork_rail(&repo.path, &["restore"])?;
  assert_exit(&output, 0);
  assert!(stdout_of(&output).contains("Discarded partial backup"));

  assert!(!repo.file_exists("pyproject.toml.rail-backup.tmp"));
  assert_eq!(repo.read_file("pyproject.toml")?, MANIFEST);
  Ok(())
}
