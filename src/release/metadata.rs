//! Generated build metadata and manifest overrides
//!
//! Both files are produced from typed values through structured writers: string
//! literals in the build-info module are emitted with JSON escaping (a subset of
//! Python's literal syntax), and the manifest is edited as a TOML document.

use crate::core::error::{ReleaseError, ReleaseResult};
use crate::release::version::ReleaseVersion;
use chrono::{DateTime, Utc};
use toml_edit::{DocumentMut, Item, value};

/// Contents of the generated `_build_info.py` module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
  pub version: String,
  pub build_date: DateTime<Utc>,
  pub git_commit: String,
  /// Always false for releases cut from a clean tree
  pub dirty: bool,
}

impl BuildInfo {
  pub fn for_release(version: &ReleaseVersion, git_commit: &str, build_date: DateTime<Utc>) -> Self {
    Self {
      version: version.to_string(),
      build_date,
      git_commit: git_commit.to_string(),
      dirty: false,
    }
  }

  /// Render as a Python module
  pub fn render(&self) -> ReleaseResult<String> {
    let date = self.build_date.format("%Y-%m-%d %H:%M:%S%.6f+00:00").to_string();
    Ok(format!(
      "# Generated by fork-rail. Do not edit or commit.\n\
       __version__ = {}\n\
       __build_date__ = {}\n\
       __git_commit__ = {}\n\
       __dirty__ = {}\n",
      serde_json::to_string(&self.version)?,
      serde_json::to_string(&date)?,
      serde_json::to_string(&self.git_commit)?,
      if self.dirty { "True" } else { "False" },
    ))
  }
}

/// Pin `project.version` and drop `version` from `project.dynamic`
///
/// Formatting and comments of the rest of the manifest are preserved.
pub fn pin_manifest_version(manifest: &str, version: &ReleaseVersion) -> ReleaseResult<String> {
  let mut doc: DocumentMut = manifest.parse()?;

  let project = doc
    .get_mut("project")
    .and_then(Item::as_table_like_mut)
    .ok_or_else(|| ReleaseError::message("No [project] table in manifest"))?;

  let mut dynamic_now_empty = false;
  if let Some(dynamic) = project.get_mut("dynamic").and_then(Item::as_array_mut) {
    dynamic.retain(|entry| entry.as_str() != Some("version"));
    dynamic_now_empty = dynamic.is_empty();
  }
  if dynamic_now_empty {
    project.remove("dynamic");
  }

  project.insert("version", value(version.as_str()));

  Ok(doc.to_string())
}
