//! Container image release flow
//!
//! Builds the (image, python version, flavor) matrix for every configured platform,
//! pushing each tag unless asked not to.

use crate::core::error::{ConfigError, ReleaseError, ReleaseResult};
use crate::core::process::{Invocation, require_programs};
use crate::release::context::{ReleaseContext, ensure_no_stale_backups};
use crate::release::driver::{RunStatus, Summary, build_all, preview};
use crate::release::registry::{RegistryCoordinates, RepositoryFormat};
use crate::release::targets::{BuildTarget, ImageTarget, enumerate_images};
use crate::release::version::{ReleaseVersion, VersionPolicy, VersionResolver};

#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
  pub dry_run: bool,
  pub no_push: bool,
  pub strict: bool,
  /// Build only this python version (empty: all configured)
  pub single_python: String,
  /// Extra tag suffix appended after the flavor
  pub image_type: String,
}

#[derive(Debug)]
pub struct ImageReport {
  pub version: ReleaseVersion,
  pub builds: Summary,
}

impl ImageReport {
  pub fn is_success(&self) -> bool {
    self.builds.status() == RunStatus::Success
  }
}

/// Full argv for one image build
pub fn build_invocation(
  ctx: &ReleaseContext,
  target: &ImageTarget,
  tag: &str,
  push: bool,
) -> ReleaseResult<Invocation> {
  let images = &ctx.config.images;
  let mut invocation = Invocation::from_argv(&ctx.config.tools.image_build, &ctx.root)?
    .arg("--platform")
    .arg(images.platforms.join(","));

  for (key, value) in target.flavor.build_args(&target.python_version) {
    invocation = invocation.arg("--build-arg").arg(format!("{}={}", key, value));
  }

  invocation = invocation
    .arg("-t")
    .arg(tag)
    .arg("-f")
    .arg(ctx.root.join(&target.dockerfile).display().to_string());
  if push {
    invocation = invocation.arg("--push");
  }
  Ok(invocation.arg(ctx.root.join(&target.context).display().to_string()))
}

pub fn release_images(
  ctx: &ReleaseContext,
  registry: &RegistryCoordinates,
  options: &ImageOptions,
) -> ReleaseResult<ImageReport> {
  let images = &ctx.config.images;
  let only_python = (!options.single_python.is_empty()).then_some(options.single_python.as_str());
  if let Some(python) = only_python
    && !images.python_versions.iter().any(|v| v == python)
  {
    return Err(ReleaseError::Config(ConfigError::Invalid {
      reason: format!(
        "python version {} is not one of the configured versions ({})",
        python,
        images.python_versions.join(", ")
      ),
    }));
  }

  let resolver = VersionResolver::new(VersionPolicy::from_strict(options.strict))?;
  let version = resolver.resolve(&ctx.tags)?;
  ctx.print_resolution(&resolver, &version);

  let targets = enumerate_images(images, only_python);
  let base = registry.docker_base();
  let push = !options.no_push;

  if options.dry_run {
    println!("\n🔍 Dry-run mode (nothing is built, overlaid or pushed)");
    preview(&targets).print();
    println!("\n🏷️  Tags:");
    for target in targets.iter().filter(|t| t.skip_reason().is_none()) {
      println!("   {}", target.tag(&base, &version, &options.image_type));
    }
    return Ok(ImageReport {
      version,
      builds: Summary::default(),
    });
  }

  let tools = &ctx.config.tools;
  let needs_gcloud = push && (ctx.config.registry.ensure_repository || ctx.config.registry.configure_docker_auth);
  let mut required = vec![tools.image_build.as_slice()];
  if needs_gcloud {
    required.push(tools.gcloud.as_slice());
  }
  require_programs(required)?;

  let paths = ctx.primary_paths();
  ensure_no_stale_backups(paths.all())?;

  if push {
    if ctx.config.registry.ensure_repository {
      println!("\n🗄️  Checking registry repository...");
      registry.ensure_repository(ctx.runner, &tools.gcloud, &ctx.root, RepositoryFormat::Docker)?;
    }
    if ctx.config.registry.configure_docker_auth {
      println!("🔑 Configuring docker credentials for {}", registry.docker_host());
      registry.configure_docker_auth(ctx.runner, &tools.gcloud, &ctx.root)?;
    }
  } else {
    println!("\n⏸️  --no-push: images stay in the local build cache");
  }

  println!("\n🐳 Building images for {}...", images.platforms.join(", "));
  let builds = build_all(&targets, |target| {
    let tag = target.tag(&base, &version, &options.image_type);
    let invocation = build_invocation(ctx, target, &tag, push)?;
    ctx.with_version_overlay(&paths, &version, || ctx.runner.run_checked(&invocation).map(|_| ()))
  });
  builds.print_report("Images");

  Ok(ImageReport { version, builds })
}
