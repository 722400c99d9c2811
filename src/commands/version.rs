//! `fork-rail version`

use crate::commands::open_workspace;
use crate::core::error::ReleaseResult;
use crate::release::version::{VersionPolicy, VersionResolver, resolve_version};

/// Print the release version the current tags resolve to
pub fn run_version(strict: bool, package: Option<String>) -> ReleaseResult<()> {
  let (git, _config) = open_workspace()?;
  let version = match package.as_deref() {
    None => resolve_version(strict, &git)?,
    Some(name) => {
      let resolver = VersionResolver::new(VersionPolicy::from_strict(strict))?;
      resolver.resolve_prefixed(&git.tags_by_creation()?, Some(name))?
    }
  };
  println!("{}", version);
  Ok(())
}
