//! Python package release flow
//!
//! Builds the primary distribution and, optionally, every integration package, then
//! uploads them to the registry's Python index in a second pass. Each versioned build
//! runs with its build-info module and manifest overlaid.

use crate::core::config::PackageConfig;
use crate::core::error::{ExitCode, ReleaseError, ReleaseResult, ResultExt};
use crate::core::process::{Invocation, require_programs};
use crate::release::context::{OverlayPaths, ReleaseContext, ensure_no_stale_backups};
use crate::release::driver::{RunStatus, Summary, build_all, preview};
use crate::release::registry::{RegistryCoordinates, RepositoryFormat};
use crate::release::targets::{BuildTarget, PackageTarget};
use crate::release::version::{ReleaseVersion, VersionPolicy, VersionResolver};
use std::fs;
use std::path::{Path, PathBuf};
use toml_edit::DocumentMut;

#[derive(Debug, Clone, Copy)]
pub struct PackageOptions {
  pub build_integrations: bool,
  pub dry_run: bool,
  pub strict: bool,
}

/// An integration package found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integration {
  pub name: String,
  pub dir: PathBuf,
}

/// Every `<integrations_dir>/*/pyproject.toml`, sorted by directory
///
/// The distribution name comes from `project.name`, falling back to the directory name.
pub fn discover_integrations(root: &Path, package: &PackageConfig) -> ReleaseResult<Vec<Integration>> {
  let base = root.join(&package.integrations_dir);
  if !base.is_dir() {
    return Ok(Vec::new());
  }

  let pattern = base.join("*").join("pyproject.toml");
  let pattern = pattern
    .to_str()
    .ok_or_else(|| ReleaseError::message(format!("Non UTF-8 path: {}", base.display())))?;

  let mut found = Vec::new();
  for manifest in glob::glob(pattern)? {
    let manifest = manifest?;
    let Some(dir) = manifest.parent().map(Path::to_path_buf) else {
      continue;
    };
    let name = manifest_name(&manifest)?.unwrap_or_else(|| {
      dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
    });
    found.push(Integration { name, dir });
  }

  found.sort_by(|a, b| a.dir.cmp(&b.dir));
  Ok(found)
}

fn manifest_name(manifest: &Path) -> ReleaseResult<Option<String>> {
  let content =
    fs::read_to_string(manifest).with_context(|| format!("Failed to read {}", manifest.display()))?;
  let doc: DocumentMut = content
    .parse()
    .with_context(|| format!("Failed to parse {}", manifest.display()))?;
  Ok(doc
    .get("project")
    .and_then(|p| p.get("name"))
    .and_then(|n| n.as_str())
    .map(str::to_string))
}

/// Files overlaid for an integration package
pub fn integration_paths(package: &PackageConfig, name: &str, dir: &Path) -> OverlayPaths {
  OverlayPaths {
    build_info: dir
      .join(name.replace('-', "_"))
      .join(&package.integration_build_info),
    manifest: dir.join("pyproject.toml"),
  }
}

/// Upload pass over one directory of built distributions
struct UploadGroup {
  label: String,
  dir: PathBuf,
}

impl BuildTarget for UploadGroup {
  fn label(&self) -> String {
    self.label.clone()
  }
}

/// Outcome of a package release run
#[derive(Debug)]
pub struct PackageReport {
  pub version: ReleaseVersion,
  pub builds: Summary,
  pub uploads: Summary,
}

impl PackageReport {
  /// 3 when every build failed, 1 for any other failure, 0 otherwise
  pub fn exit_code(&self) -> ExitCode {
    match self.builds.status() {
      RunStatus::Failed => ExitCode::Critical,
      RunStatus::Partial => ExitCode::Partial,
      RunStatus::Success if self.uploads.failed().is_empty() => ExitCode::Success,
      RunStatus::Success => ExitCode::Partial,
    }
  }
}

/// Resolve, build and upload; configuration problems surface before anything runs
pub fn release_packages(
  ctx: &ReleaseContext,
  registry: &RegistryCoordinates,
  options: PackageOptions,
) -> ReleaseResult<PackageReport> {
  let package = &ctx.config.package;
  let resolver = VersionResolver::new(VersionPolicy::from_strict(options.strict))?;
  let version = resolver.resolve(&ctx.tags)?;
  ctx.print_resolution(&resolver, &version);

  let mut targets = vec![PackageTarget::Primary {
    name: package.name.clone(),
    version: version.clone(),
  }];
  if options.build_integrations {
    for integration in discover_integrations(&ctx.root, package)? {
      let version = resolver.resolve_package(&ctx.tags, &integration.name)?;
      targets.push(PackageTarget::Integration {
        name: integration.name,
        dir: integration.dir,
        version,
      });
    }
  }

  let dist = ctx.root.join(&package.dist_dir);
  let integrations_dist = ctx.root.join(package.integrations_dist_dir());

  if options.dry_run {
    println!("\n🔍 Dry-run mode (nothing is built, overlaid or uploaded)");
    preview(&targets).print();
    println!("\n📤 Uploads would go to {}", registry.python_index());
    return Ok(PackageReport {
      version,
      builds: Summary::default(),
      uploads: Summary::default(),
    });
  }

  let tools = &ctx.config.tools;
  let mut required = vec![tools.package_build.as_slice(), tools.package_upload.as_slice()];
  if ctx.config.registry.ensure_repository {
    required.push(tools.gcloud.as_slice());
  }
  require_programs(required)?;

  let overlays: Vec<OverlayPaths> = targets.iter().filter_map(|t| overlay_paths(ctx, t)).collect();
  ensure_no_stale_backups(overlays.iter().flat_map(OverlayPaths::all))?;

  if ctx.config.registry.ensure_repository {
    println!("\n🗄️  Checking registry repository...");
    registry.ensure_repository(ctx.runner, &tools.gcloud, &ctx.root, RepositoryFormat::Python)?;
  }

  reset_dir(&dist)?;

  println!("\n🔨 Building {} distribution(s)...", targets.len());
  let builds = build_all(&targets, |target| {
    let (cwd, out_dir) = match target {
      PackageTarget::Primary { .. } => (ctx.root.as_path(), dist.as_path()),
      PackageTarget::Integration { dir, .. } => (dir.as_path(), integrations_dist.as_path()),
    };
    let build = || {
      let invocation = Invocation::from_argv(&tools.package_build, cwd)?
        .arg("--out-dir")
        .arg(out_dir.display().to_string());
      ctx.runner.run_checked(&invocation).map(|_| ())
    };

    match (overlay_paths(ctx, target), target.version()) {
      (Some(paths), Some(version)) => ctx.with_version_overlay(&paths, version, build),
      _ => {
        tracing::info!(package = target.name(), "building with dynamic versioning");
        build()
      }
    }
  });
  builds.print_report("Builds");

  let mut groups = Vec::new();
  // Primary distributions upload only when their own build succeeded
  if targets.first().is_some_and(|primary| builds.is_success(&primary.label())) {
    groups.push(UploadGroup {
      label: format!("{} distributions", package.name),
      dir: dist.clone(),
    });
  }
  // Integration uploads follow the source tree, not the builds that succeeded
  if options.build_integrations && ctx.root.join(&package.integrations_dir).is_dir() {
    groups.push(UploadGroup {
      label: "integration distributions".to_string(),
      dir: integrations_dist.clone(),
    });
  }

  println!("\n📤 Uploading to {}", registry.python_index());
  let uploads = build_all(&groups, |group| {
    let files = distributions_in(&group.dir)?;
    if files.is_empty() {
      return Err(ReleaseError::message(format!("No distributions in {}", group.dir.display())));
    }
    let invocation = Invocation::from_argv(&tools.package_upload, &ctx.root)?
      .arg("--repository-url")
      .arg(registry.python_index())
      .args(files.iter().map(|f| f.display().to_string()));
    ctx.runner.run_checked(&invocation).map(|_| ())
  });
  uploads.print_report("Uploads");

  Ok(PackageReport {
    version,
    builds,
    uploads,
  })
}

fn overlay_paths(ctx: &ReleaseContext, target: &PackageTarget) -> Option<OverlayPaths> {
  match target {
    PackageTarget::Primary { .. } => Some(ctx.primary_paths()),
    PackageTarget::Integration {
      name,
      dir,
      version: Some(_),
    } => Some(integration_paths(&ctx.config.package, name, dir)),
    PackageTarget::Integration { version: None, .. } => None,
  }
}

/// Empty `dir` so stale artifacts are never uploaded
fn reset_dir(dir: &Path) -> ReleaseResult<()> {
  if dir.exists() {
    fs::remove_dir_all(dir).with_context(|| format!("Failed to clear {}", dir.display()))?;
  }
  fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
  Ok(())
}

/// Regular files directly inside `dir`, sorted
fn distributions_in(dir: &Path) -> ReleaseResult<Vec<PathBuf>> {
  let mut files = Vec::new();
  for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
    let path = entry?.path();
    if path.is_file() {
      files.push(path);
    }
  }
  files.sort();
  Ok(files)
}
