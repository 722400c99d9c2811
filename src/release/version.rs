//! Release version resolution from tag history
//!
//! The newest tag (by creation date) matching the release pattern is the version of
//! the run. Strict mode accepts only `X.Y.Z`; permissive mode also accepts dotted
//! suffixes such as `X.Y.Z.dev1`. Integration packages use tags prefixed with
//! `<package-name>-`, and the prefix is stripped from the result.

use crate::core::error::{ConfigError, ReleaseError, ReleaseResult};
use crate::core::vcs::{SystemGit, TagInfo};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

pub const STRICT_PATTERN: &str = r"^\d+\.\d+\.\d+$";
pub const PERMISSIVE_PATTERN: &str = r"^\d+\.\d+\.\d+(\.[A-Za-z0-9]+)*$";

/// How strict the release tag pattern is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPolicy {
  Strict,
  Permissive,
}

impl VersionPolicy {
  pub fn from_strict(strict: bool) -> Self {
    if strict { Self::Strict } else { Self::Permissive }
  }

  pub fn pattern(self) -> &'static str {
    match self {
      Self::Strict => STRICT_PATTERN,
      Self::Permissive => PERMISSIVE_PATTERN,
    }
  }
}

impl fmt::Display for VersionPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Strict => write!(f, "strict"),
      Self::Permissive => write!(f, "permissive"),
    }
  }
}

/// A resolved release version; never empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseVersion(String);

impl ReleaseVersion {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ReleaseVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Anything that can list tags with creation times
pub trait TagSource {
  fn tags(&self) -> ReleaseResult<Vec<TagInfo>>;
}

impl TagSource for SystemGit {
  fn tags(&self) -> ReleaseResult<Vec<TagInfo>> {
    self.tags_by_creation()
  }
}

impl TagSource for [TagInfo] {
  fn tags(&self) -> ReleaseResult<Vec<TagInfo>> {
    Ok(self.to_vec())
  }
}

impl TagSource for Vec<TagInfo> {
  fn tags(&self) -> ReleaseResult<Vec<TagInfo>> {
    Ok(self.clone())
  }
}

/// A tag that matched the pattern, with the version it names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
  pub tag: TagInfo,
  pub version: String,
}

pub struct VersionResolver {
  policy: VersionPolicy,
  pattern: Regex,
}

impl VersionResolver {
  pub fn new(policy: VersionPolicy) -> ReleaseResult<Self> {
    Ok(Self {
      policy,
      pattern: Regex::new(policy.pattern())?,
    })
  }

  pub fn policy(&self) -> VersionPolicy {
    self.policy
  }

  /// Every matching tag, newest first
  ///
  /// Ordering: creation time descending; ties broken by the numeric `X.Y.Z` core
  /// descending, then by tag name in descending byte order. git's own output order
  /// never decides the result.
  pub fn candidates(&self, tags: &[TagInfo], package: Option<&str>) -> Vec<Candidate> {
    let prefix = package.map(|name| format!("{}-", name));

    let mut matches: Vec<Candidate> = tags
      .iter()
      .filter_map(|tag| {
        let version = match &prefix {
          Some(prefix) => tag.name.strip_prefix(prefix.as_str())?,
          None => tag.name.as_str(),
        };
        self.pattern.is_match(version).then(|| Candidate {
          tag: tag.clone(),
          version: version.to_string(),
        })
      })
      .collect();

    matches.sort_by(newest_first);
    matches
  }

  /// Resolve the version of the primary package or an image; absence is fatal
  pub fn resolve(&self, tags: &[TagInfo]) -> ReleaseResult<ReleaseVersion> {
    self.resolve_prefixed(tags, None)
  }

  /// Newest version among `<package>-<version>` tags (plain tags for `None`)
  pub fn resolve_prefixed(&self, tags: &[TagInfo], package: Option<&str>) -> ReleaseResult<ReleaseVersion> {
    self
      .candidates(tags, package)
      .into_iter()
      .next()
      .map(|c| ReleaseVersion(c.version))
      .ok_or_else(|| self.no_tag_error(package))
  }

  /// Resolve an integration package's version from `<package>-<version>` tags
  ///
  /// Strict mode treats absence as fatal. Permissive mode returns `None` so the
  /// package falls back to its own dynamic versioning.
  pub fn resolve_package(&self, tags: &[TagInfo], package: &str) -> ReleaseResult<Option<ReleaseVersion>> {
    match (self.resolve_prefixed(tags, Some(package)), self.policy) {
      (Ok(version), _) => Ok(Some(version)),
      (Err(e), VersionPolicy::Strict) => Err(e),
      (Err(_), VersionPolicy::Permissive) => {
        tracing::warn!(package, "no release tag found, falling back to dynamic versioning");
        println!("   ⚠️  No release tag for {}; building with its own dynamic version", package);
        Ok(None)
      }
    }
  }

  fn no_tag_error(&self, package: Option<&str>) -> ReleaseError {
    ReleaseError::Config(ConfigError::NoReleaseTag {
      pattern: self.policy.pattern().to_string(),
      prefix: package.map(|name| format!("{}-", name)),
    })
  }
}

/// Resolve the release version from a tag source
pub fn resolve_version(strict: bool, source: &(impl TagSource + ?Sized)) -> ReleaseResult<ReleaseVersion> {
  let tags = source.tags()?;
  VersionResolver::new(VersionPolicy::from_strict(strict))?.resolve(&tags)
}

fn newest_first(a: &Candidate, b: &Candidate) -> Ordering {
  b.tag
    .created
    .cmp(&a.tag.created)
    .then_with(|| numeric_core(&b.version).cmp(&numeric_core(&a.version)))
    .then_with(|| b.tag.name.cmp(&a.tag.name))
}

/// `(major, minor, patch)` of a matched version; components beyond u64 saturate
fn numeric_core(version: &str) -> [u64; 3] {
  let mut core = [0u64; 3];
  for (slot, part) in core.iter_mut().zip(version.split('.')) {
    *slot = part.parse().unwrap_or(u64::MAX);
  }
  core
}
