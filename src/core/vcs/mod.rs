pub mod system_git;
mod system_git_ops;

pub use system_git::SystemGit;

/// A tag together with its creation time
///
/// Annotated tags carry the tagger date; lightweight tags fall back to the
/// committer date of the commit they point at (git's `creatordate`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInfo {
  pub name: String,
  pub created: i64,
}
