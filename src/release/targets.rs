//! Build targets for the release flows
//!
//! Image variants are a closed enumeration: which (image kind, flavor) pairs can be
//! built is decided by [`is_compatible`], a total function over the variant space.

use crate::core::config::{ImageTargetConfig, ImagesConfig};
use crate::release::version::ReleaseVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Logical image families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
  /// Full server/worker image
  Server,
  /// Slim client-only image
  Client,
}

/// Image flavors, layered on top of a python runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
  Standard,
  Conda,
  Kubernetes,
}

impl Flavor {
  /// Suffix appended to the image tag
  pub fn tag_suffix(self) -> &'static str {
    match self {
      Flavor::Standard => "",
      Flavor::Conda => "-conda",
      Flavor::Kubernetes => "-kubernetes",
    }
  }

  /// Build arguments selecting this flavor in the Dockerfile
  pub fn build_args(self, python_version: &str) -> Vec<(String, String)> {
    let base_image = match self {
      Flavor::Conda => "prefect-conda".to_string(),
      Flavor::Standard | Flavor::Kubernetes => format!("python:{}-slim", python_version),
    };
    let extras = match self {
      Flavor::Kubernetes => "[kubernetes]",
      Flavor::Standard | Flavor::Conda => "",
    };
    vec![
      ("PYTHON_VERSION".to_string(), python_version.to_string()),
      ("BASE_IMAGE".to_string(), base_image),
      ("PREFECT_EXTRAS".to_string(), extras.to_string()),
    ]
  }
}

impl fmt::Display for Flavor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Flavor::Standard => write!(f, "standard"),
      Flavor::Conda => write!(f, "conda"),
      Flavor::Kubernetes => write!(f, "kubernetes"),
    }
  }
}

/// Whether an image kind can be built in a flavor
pub fn is_compatible(kind: ImageKind, flavor: Flavor) -> bool {
  match (kind, flavor) {
    (ImageKind::Server, _) => true,
    (ImageKind::Client, Flavor::Standard) => true,
    (ImageKind::Client, Flavor::Conda | Flavor::Kubernetes) => false,
  }
}

/// Anything the build driver can iterate over
pub trait BuildTarget {
  /// Short human-readable identity
  fn label(&self) -> String;

  /// `Some(reason)` for targets that must not be attempted
  fn skip_reason(&self) -> Option<String> {
    None
  }
}

/// One (image, python version, flavor) combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTarget {
  pub name: String,
  pub kind: ImageKind,
  pub python_version: String,
  pub flavor: Flavor,
  pub dockerfile: PathBuf,
  pub context: PathBuf,
}

impl ImageTarget {
  /// `<base>/<image>:<version>-python<py>[<flavor-suffix>][-<image-type>]`
  pub fn tag(&self, registry_base: &str, version: &ReleaseVersion, image_type: &str) -> String {
    let mut tag = format!(
      "{}/{}:{}-python{}{}",
      registry_base,
      self.name,
      version,
      self.python_version,
      self.flavor.tag_suffix()
    );
    if !image_type.is_empty() {
      tag.push('-');
      tag.push_str(image_type);
    }
    tag
  }
}

impl BuildTarget for ImageTarget {
  fn label(&self) -> String {
    format!("{} python{} {}", self.name, self.python_version, self.flavor)
  }

  fn skip_reason(&self) -> Option<String> {
    (!is_compatible(self.kind, self.flavor))
      .then(|| format!("{} flavor is not built for the {} image", self.flavor, self.name))
  }
}

/// Enumerate the image matrix: images outer, python versions middle, flavors inner
///
/// `only_python` narrows the middle axis to one version (must be configured).
pub fn enumerate_images(images: &ImagesConfig, only_python: Option<&str>) -> Vec<ImageTarget> {
  let mut targets = Vec::new();

  for image in &images.targets {
    for python_version in &images.python_versions {
      if only_python.is_some_and(|only| only != python_version) {
        continue;
      }
      for flavor in &images.flavors {
        targets.push(image_target(image, python_version, *flavor));
      }
    }
  }

  targets
}

fn image_target(image: &ImageTargetConfig, python_version: &str, flavor: Flavor) -> ImageTarget {
  ImageTarget {
    name: image.name.clone(),
    kind: image.kind,
    python_version: python_version.to_string(),
    flavor,
    dockerfile: image.dockerfile.clone(),
    context: image.context.clone(),
  }
}

/// A Python distribution to build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageTarget {
  /// The fork's main package, built from the repository root
  Primary { name: String, version: ReleaseVersion },
  /// A package under the integrations directory
  Integration {
    name: String,
    dir: PathBuf,
    /// `None` falls back to the package's own dynamic versioning
    version: Option<ReleaseVersion>,
  },
}

impl PackageTarget {
  pub fn name(&self) -> &str {
    match self {
      PackageTarget::Primary { name, .. } | PackageTarget::Integration { name, .. } => name,
    }
  }

  pub fn version(&self) -> Option<&ReleaseVersion> {
    match self {
      PackageTarget::Primary { version, .. } => Some(version),
      PackageTarget::Integration { version, .. } => version.as_ref(),
    }
  }
}

impl BuildTarget for PackageTarget {
  fn label(&self) -> String {
    match self.version() {
      Some(version) => format!("{} {}", self.name(), version),
      None => format!("{} (dynamic version)", self.name()),
    }
  }
}
