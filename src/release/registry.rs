//! Artifact registry coordinates and repository preparation

use crate::core::error::{ConfigError, ReleaseError, ReleaseResult};
use crate::core::process::{Invocation, ToolRunner};
use std::fmt;
use std::path::Path;

/// Repository formats understood by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryFormat {
  Python,
  Docker,
}

impl fmt::Display for RepositoryFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RepositoryFormat::Python => write!(f, "python"),
      RepositoryFormat::Docker => write!(f, "docker"),
    }
  }
}

/// Where artifacts of one run are published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryCoordinates {
  pub project: String,
  pub region: String,
  pub repository: String,
}

impl RegistryCoordinates {
  pub fn new(project: &str, region: &str, repository: &str) -> ReleaseResult<Self> {
    for (field, value) in [("project-id", project), ("region", region), ("repo-name", repository)] {
      if value.trim().is_empty() {
        return Err(ReleaseError::Config(ConfigError::MissingField {
          field: field.to_string(),
        }));
      }
      if value.contains('/') || value.chars().any(char::is_whitespace) {
        return Err(ReleaseError::Config(ConfigError::Invalid {
          reason: format!("{} '{}' is not a valid registry coordinate", field, value),
        }));
      }
    }
    Ok(Self {
      project: project.to_string(),
      region: region.to_string(),
      repository: repository.to_string(),
    })
  }

  /// `<region>-docker.pkg.dev`
  pub fn docker_host(&self) -> String {
    format!("{}-docker.pkg.dev", self.region)
  }

  /// `<region>-docker.pkg.dev/<project>/<repo>`
  pub fn docker_base(&self) -> String {
    format!("{}/{}/{}", self.docker_host(), self.project, self.repository)
  }

  /// Upload endpoint for Python distributions
  pub fn python_index(&self) -> String {
    format!("https://{}-python.pkg.dev/{}/{}/", self.region, self.project, self.repository)
  }

  /// Make sure the repository exists, creating it in `format` when it does not
  pub fn ensure_repository(
    &self,
    runner: &dyn ToolRunner,
    gcloud: &[String],
    cwd: &Path,
    format: RepositoryFormat,
  ) -> ReleaseResult<()> {
    let describe = Invocation::from_argv(gcloud, cwd)?
      .args(["artifacts", "repositories", "describe", self.repository.as_str()])
      .args(self.scope_args());

    if runner.run(&describe)?.success() {
      println!("   ✅ Repository '{}' exists", self.repository);
      return Ok(());
    }

    println!("   📦 Creating {} repository '{}'...", format, self.repository);
    let create = Invocation::from_argv(gcloud, cwd)?
      .args(["artifacts", "repositories", "create", self.repository.as_str()])
      .arg(format!("--repository-format={}", format))
      .args(self.scope_args());
    runner.run_checked(&create)?;
    Ok(())
  }

  /// Register the registry host with docker's credential helper
  pub fn configure_docker_auth(&self, runner: &dyn ToolRunner, gcloud: &[String], cwd: &Path) -> ReleaseResult<()> {
    let invocation = Invocation::from_argv(gcloud, cwd)?
      .args(["auth", "configure-docker"])
      .arg(self.docker_host())
      .arg("--quiet");
    runner.run_checked(&invocation)?;
    Ok(())
  }

  fn scope_args(&self) -> [String; 2] {
    [
      format!("--project={}", self.project),
      format!("--location={}", self.region),
    ]
  }
}
