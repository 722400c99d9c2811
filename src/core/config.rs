use crate::core::error::{ConfigError, ReleaseError, ReleaseResult, ResultExt};
use crate::release::targets::{Flavor, ImageKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for fork-rail
/// Searched in order: release.toml, .release.toml, .config/release.toml
///
/// Every section has defaults matching the fork's layout, so the file is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReleaseConfig {
  #[serde(default)]
  pub package: PackageConfig,
  #[serde(default)]
  pub images: ImagesConfig,
  #[serde(default)]
  pub tools: ToolsConfig,
  #[serde(default)]
  pub registry: RegistryConfig,
  #[serde(default)]
  pub sync: SyncConfig,
}

/// Primary package and integration packages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
  /// Distribution name of the primary package
  #[serde(default = "default_package_name")]
  pub name: String,

  /// Generated build-metadata module (relative to repo root)
  #[serde(default = "default_build_info")]
  pub build_info: PathBuf,

  /// Manifest whose dynamic version gets pinned (relative to repo root)
  #[serde(default = "default_manifest")]
  pub manifest: PathBuf,

  /// Output directory for built distributions
  #[serde(default = "default_dist_dir")]
  pub dist_dir: PathBuf,

  /// Directory holding one sub-directory per integration package
  #[serde(default = "default_integrations_dir")]
  pub integrations_dir: PathBuf,

  /// Name of the build-metadata module inside an integration's import package
  #[serde(default = "default_integration_build_info")]
  pub integration_build_info: String,
}

fn default_package_name() -> String {
  "prefect".to_string()
}

fn default_build_info() -> PathBuf {
  PathBuf::from("src/prefect/_build_info.py")
}

fn default_manifest() -> PathBuf {
  PathBuf::from("pyproject.toml")
}

fn default_dist_dir() -> PathBuf {
  PathBuf::from("dist")
}

fn default_integrations_dir() -> PathBuf {
  PathBuf::from("src/integrations")
}

fn default_integration_build_info() -> String {
  "_build_info.py".to_string()
}

impl Default for PackageConfig {
  fn default() -> Self {
    Self {
      name: default_package_name(),
      build_info: default_build_info(),
      manifest: default_manifest(),
      dist_dir: default_dist_dir(),
      integrations_dir: default_integrations_dir(),
      integration_build_info: default_integration_build_info(),
    }
  }
}

impl PackageConfig {
  /// Where integration distributions are written
  pub fn integrations_dist_dir(&self) -> PathBuf {
    self.dist_dir.join("integrations")
  }
}

/// Container image matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
  /// Python runtime versions, in build order
  #[serde(default = "default_python_versions")]
  pub python_versions: Vec<String>,

  /// Flavors, in build order
  #[serde(default = "default_flavors")]
  pub flavors: Vec<Flavor>,

  /// Platforms passed to the multi-platform builder
  #[serde(default = "default_platforms")]
  pub platforms: Vec<String>,

  /// Logical images, in build order
  #[serde(default = "default_image_targets")]
  pub targets: Vec<ImageTargetConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageTargetConfig {
  pub name: String,
  pub kind: ImageKind,
  #[serde(default = "default_dockerfile")]
  pub dockerfile: PathBuf,
  #[serde(default = "default_context")]
  pub context: PathBuf,
}

fn default_python_versions() -> Vec<String> {
  ["3.9", "3.10", "3.11", "3.12", "3.13"].iter().map(|v| v.to_string()).collect()
}

fn default_flavors() -> Vec<Flavor> {
  vec![Flavor::Standard, Flavor::Conda, Flavor::Kubernetes]
}

fn default_platforms() -> Vec<String> {
  vec!["linux/amd64".to_string(), "linux/arm64".to_string()]
}

fn default_dockerfile() -> PathBuf {
  PathBuf::from("Dockerfile")
}

fn default_context() -> PathBuf {
  PathBuf::from(".")
}

fn default_image_targets() -> Vec<ImageTargetConfig> {
  vec![
    ImageTargetConfig {
      name: "prefect".to_string(),
      kind: ImageKind::Server,
      dockerfile: default_dockerfile(),
      context: default_context(),
    },
    ImageTargetConfig {
      name: "prefect-client".to_string(),
      kind: ImageKind::Client,
      dockerfile: PathBuf::from("client/Dockerfile"),
      context: default_context(),
    },
  ]
}

impl Default for ImagesConfig {
  fn default() -> Self {
    Self {
      python_versions: default_python_versions(),
      flavors: default_flavors(),
      platforms: default_platforms(),
      targets: default_image_targets(),
    }
  }
}

/// External tools, as argv prefixes
///
/// fork-rail appends its own arguments (`--out-dir`, `--repository-url`, tags, ...)
/// to each prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
  #[serde(default = "default_package_build")]
  pub package_build: Vec<String>,
  #[serde(default = "default_package_upload")]
  pub package_upload: Vec<String>,
  #[serde(default = "default_image_build")]
  pub image_build: Vec<String>,
  #[serde(default = "default_gcloud")]
  pub gcloud: Vec<String>,
}

fn default_package_build() -> Vec<String> {
  vec!["uv".to_string(), "build".to_string()]
}

fn default_package_upload() -> Vec<String> {
  vec!["twine".to_string(), "upload".to_string()]
}

fn default_image_build() -> Vec<String> {
  vec!["docker".to_string(), "buildx".to_string(), "build".to_string()]
}

fn default_gcloud() -> Vec<String> {
  vec!["gcloud".to_string()]
}

impl Default for ToolsConfig {
  fn default() -> Self {
    Self {
      package_build: default_package_build(),
      package_upload: default_package_upload(),
      image_build: default_image_build(),
      gcloud: default_gcloud(),
    }
  }
}

/// Artifact registry preparation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
  /// Describe the repository and create it when missing
  #[serde(default = "default_true")]
  pub ensure_repository: bool,

  /// Register the registry host as a docker credential helper before pushing
  #[serde(default = "default_true")]
  pub configure_docker_auth: bool,
}

fn default_true() -> bool {
  true
}

impl Default for RegistryConfig {
  fn default() -> Self {
    Self {
      ensure_repository: true,
      configure_docker_auth: true,
    }
  }
}

/// Branch lineages for the sync driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
  /// Remote of the upstream project
  #[serde(default = "default_upstream_remote")]
  pub upstream_remote: String,

  /// Remote of the fork
  #[serde(default = "default_fork_remote")]
  pub fork_remote: String,

  /// Integration branch tracking upstream (default: "main")
  #[serde(default = "default_main_branch")]
  pub main_branch: String,

  /// Fork-only release branch replayed on top of main
  #[serde(default = "default_release_branch")]
  pub release_branch: String,

  /// Prefix for timestamped backup branches
  #[serde(default = "default_backup_prefix")]
  pub backup_prefix: String,
}

fn default_upstream_remote() -> String {
  "upstream".to_string()
}

fn default_fork_remote() -> String {
  "origin".to_string()
}

fn default_main_branch() -> String {
  "main".to_string()
}

fn default_release_branch() -> String {
  "release".to_string()
}

fn default_backup_prefix() -> String {
  "backup".to_string()
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      upstream_remote: default_upstream_remote(),
      fork_remote: default_fork_remote(),
      main_branch: default_main_branch(),
      release_branch: default_release_branch(),
      backup_prefix: default_backup_prefix(),
    }
  }
}

impl ReleaseConfig {
  /// Find config file in search order: release.toml, .release.toml, .config/release.toml
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = vec![
      path.join("release.toml"),
      path.join(".release.toml"),
      path.join(".config").join("release.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load config, falling back to defaults when no file exists
  pub fn load(path: &Path) -> ReleaseResult<Self> {
    let Some(config_path) = Self::find_config_path(path) else {
      tracing::debug!(root = %path.display(), "no release.toml found, using defaults");
      return Ok(Self::default());
    };

    let content = fs::read_to_string(&config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    let config: ReleaseConfig = toml_edit::de::from_str(&content)?;

    config
      .validate()
      .map_err(|e| ReleaseError::Config(ConfigError::Invalid {
        reason: format!("{} ({})", e, config_path.display()),
      }))?;

    tracing::debug!(path = %config_path.display(), "loaded release config");
    Ok(config)
  }

  /// Check invariants serde cannot express
  pub fn validate(&self) -> Result<(), String> {
    if self.package.name.trim().is_empty() {
      return Err("package.name must not be empty".to_string());
    }
    if self.images.python_versions.is_empty() {
      return Err("images.python_versions must list at least one version".to_string());
    }
    if self.images.platforms.is_empty() {
      return Err("images.platforms must list at least one platform".to_string());
    }

    let mut seen = HashSet::new();
    for target in &self.images.targets {
      if target.name.trim().is_empty() {
        return Err("images.targets entries need a name".to_string());
      }
      if !seen.insert(target.name.as_str()) {
        return Err(format!("image '{}' is declared twice", target.name));
      }
    }

    let tools = [
      ("tools.package_build", &self.tools.package_build),
      ("tools.package_upload", &self.tools.package_upload),
      ("tools.image_build", &self.tools.image_build),
      ("tools.gcloud", &self.tools.gcloud),
    ];
    for (field, argv) in tools {
      if argv.first().is_none_or(|program| program.trim().is_empty()) {
        return Err(format!("{} must name a program", field));
      }
    }

    if self.sync.upstream_remote == self.sync.fork_remote {
      return Err("sync.upstream_remote and sync.fork_remote must differ".to_string());
    }
    if self.sync.main_branch == self.sync.release_branch {
      return Err("sync.main_branch and sync.release_branch must differ".to_string());
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_defaults_without_file() {
    let dir = TempDir::new().unwrap();
    let config = ReleaseConfig::load(dir.path()).unwrap();
    assert_eq!(config.package.name, "prefect");
    assert_eq!(config.images.targets.len(), 2);
    assert_eq!(config.sync.release_branch, "release");
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(
      dir.path().join("release.toml"),
      r#"
[images]
python_versions = ["3.12"]

[tools]
package_build = ["sh", "-c", "exit 0"]
"#,
    )
    .unwrap();

    let config = ReleaseConfig::load(dir.path()).unwrap();
    assert_eq!(config.images.python_versions, vec!["3.12"]);
    assert_eq!(config.images.flavors.len(), 3);
    assert_eq!(config.tools.package_build[0], "sh");
    assert_eq!(config.tools.package_upload[0], "twine");
  }

  #[test]
  fn test_search_order_prefers_root_file() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join(".config")).unwrap();
    fs::write(dir.path().join(".config/release.toml"), "").unwrap();
    fs::write(dir.path().join("release.toml"), "").unwrap();

    let found = ReleaseConfig::find_config_path(dir.path()).unwrap();
    assert_eq!(found, dir.path().join("release.toml"));
  }

  #[test]
  fn test_invalid_config_is_config_error() {
    let dir = TempDir::new().unwrap();
    fs::write(
      dir.path().join("release.toml"),
      r#"
[sync]
upstream_remote = "origin"
fork_remote = "origin"
"#,
    )
    .unwrap();

    let err = ReleaseConfig::load(dir.path()).unwrap_err();
    assert!(err.is_config());
  }

  #[test]
  fn test_duplicate_image_names_rejected() {
    let mut config = ReleaseConfig::default();
    let first = config.images.targets[0].clone();
    config.images.targets.push(first);
    assert!(config.validate().unwrap_err().contains("declared twice"));
  }

  #[test]
  fn test_empty_tool_rejected() {
    let mut config = ReleaseConfig::default();
    config.tools.image_build.clear();
    assert!(config.validate().unwrap_err().contains("tools.image_build"));
  }
}
