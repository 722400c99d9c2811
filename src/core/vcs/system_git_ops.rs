//! Additional operations for SystemGit (tags, remotes, branch reconciliation)

use super::TagInfo;
use super::system_git::SystemGit;
use crate::core::error::{GitError, ReleaseError, ReleaseResult};
use std::path::PathBuf;

impl SystemGit {
    /// List all tags, newest creation date first
    ///
    /// Uses `git for-each-ref` so annotated and lightweight tags are both covered.
    pub fn tags_by_creation(&self) -> ReleaseResult<Vec<TagInfo>> {
        let output = self.run(&[
            "for-each-ref",
            "--sort=-creatordate",
            "--format=%(refname:strip=2)%09%(creatordate:unix)",
            "refs/tags",
        ])?;

        Ok(parse_tag_lines(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Uncommitted changes to tracked files, as `git status --porcelain` lines
    ///
    /// Returns `None` for a clean tree.
    pub fn uncommitted_changes(&self) -> ReleaseResult<Option<String>> {
        let output = self.run(&["status", "--porcelain", "--untracked-files=no"])?;
        let status = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        Ok(if status.is_empty() { None } else { Some(status) })
    }

    /// Check whether a local branch exists
    pub fn branch_exists(&self, name: &str) -> ReleaseResult<bool> {
        let refname = format!("refs/heads/{}", name);
        let output = self.output(&["rev-parse", "--verify", "--quiet", &refname])?;
        Ok(output.status.success())
    }

    /// Resolve a revision to its full SHA, `None` if it does not exist
    pub fn resolve(&self, rev: &str) -> ReleaseResult<Option<String>> {
        let commitish = format!("{}^{{commit}}", rev);
        let output = self.output(&["rev-parse", "--verify", "--quiet", &commitish])?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
    }

    /// Resolve a revision that must exist
    pub fn require_rev(&self, rev: &str) -> ReleaseResult<String> {
        self.resolve(rev)?.ok_or_else(|| {
            ReleaseError::Git(GitError::CommandFailed {
                command: format!("git rev-parse {}", rev),
                stderr: format!("unknown revision '{}'", rev),
            })
        })
    }

    /// Number of commits reachable from `to` but not from `from`
    pub fn count_commits(&self, from: &str, to: &str) -> ReleaseResult<usize> {
        let range = format!("{}..{}", from, to);
        let output = self.run(&["rev-list", "--count", &range])?;
        let count = String::from_utf8_lossy(&output.stdout).trim().to_string();
        count
            .parse::<usize>()
            .map_err(|e| ReleaseError::message(format!("Unexpected rev-list output '{}': {}", count, e)))
    }

    /// Check whether `ancestor` is reachable from `descendant`
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> ReleaseResult<bool> {
        let output = self.output(&["merge-base", "--is-ancestor", ancestor, descendant])?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(ReleaseError::Git(GitError::CommandFailed {
                command: format!("git merge-base --is-ancestor {} {}", ancestor, descendant),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })),
        }
    }

    /// List all remotes
    pub fn list_remotes(&self) -> ReleaseResult<Vec<(String, String)>> {
        let output = self.output(&["remote", "-v"])?;

        if !output.status.success() {
            return Ok(vec![]);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut remotes = Vec::new();

        for line in stdout.lines() {
            // Format: "origin  git@github.com:user/repo.git (fetch)"
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 && line.contains("(fetch)") {
                remotes.push((parts[0].to_string(), parts[1].to_string()));
            }
        }

        Ok(remotes)
    }

    /// Check if remote exists
    pub fn has_remote(&self, name: &str) -> ReleaseResult<bool> {
        let remotes = self.list_remotes()?;
        Ok(remotes.iter().any(|(n, _)| n == name))
    }

    /// Fetch branches and tags from remote
    pub fn fetch_from_remote(&self, remote_name: &str) -> ReleaseResult<()> {
        println!("   Fetching from remote '{}'...", remote_name);
        self.run(&["fetch", "--tags", remote_name])?;
        println!("   ✅ Fetched from {}", remote_name);
        Ok(())
    }

    /// Create a branch at a start point
    pub fn create_branch_at(&self, branch_name: &str, start: &str) -> ReleaseResult<()> {
        self.run(&["branch", branch_name, start]).map(|_| ())
    }

    /// Checkout a branch
    pub fn checkout_branch(&self, branch_name: &str) -> ReleaseResult<()> {
        self.run(&["checkout", branch_name]).map(|_| ())
    }

    /// Fast-forward the checked-out branch to `target`
    pub fn merge_ff_only(&self, branch: &str, target: &str) -> ReleaseResult<()> {
        let output = self.output(&["merge", "--ff-only", target])?;
        if !output.status.success() {
            return Err(ReleaseError::Git(GitError::NotFastForward {
                branch: branch.to_string(),
                target: target.to_string(),
            }));
        }
        Ok(())
    }

    /// Replay `branch` onto `onto`
    ///
    /// A conflict leaves the rebase in progress for a human to continue or abort.
    pub fn rebase(&self, branch: &str, onto: &str) -> ReleaseResult<()> {
        let output = self.output(&["rebase", onto, branch])?;
        if output.status.success() {
            return Ok(());
        }

        if self.rebase_in_progress()? {
            return Err(ReleaseError::Git(GitError::RebaseConflict {
                branch: branch.to_string(),
                onto: onto.to_string(),
            }));
        }

        Err(ReleaseError::Git(GitError::CommandFailed {
            command: format!("git rebase {} {}", onto, branch),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }))
    }

    /// Whether a stopped rebase is waiting to be continued or aborted
    pub fn rebase_in_progress(&self) -> ReleaseResult<bool> {
        for state in ["rebase-merge", "rebase-apply"] {
            if self.git_path(state)?.exists() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Location of `name` inside this work tree's git directory
    ///
    /// Linked worktrees and submodules have a `.git` file rather than a directory.
    pub fn git_path(&self, name: &str) -> ReleaseResult<PathBuf> {
        let output = self.run(&["rev-parse", "--git-path", name])?;
        let path = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        if path.is_absolute() {
            Ok(path)
        } else {
            Ok(self.repo_path.join(path))
        }
    }

    /// Push a branch to remote
    pub fn push_branch(&self, remote_name: &str, branch: &str) -> ReleaseResult<()> {
        let output = self.output(&["push", remote_name, branch])?;
        push_result(remote_name, branch, &output)
    }

    /// Force-push a rewritten branch, only if the remote still points at `expected`
    pub fn push_force_with_lease(&self, remote_name: &str, branch: &str, expected: &str) -> ReleaseResult<()> {
        let lease = format!("--force-with-lease={}:{}", branch, expected);
        let output = self.output(&["push", &lease, remote_name, branch])?;
        push_result(remote_name, branch, &output)
    }

    /// Push all tags to remote
    pub fn push_tags(&self, remote_name: &str) -> ReleaseResult<()> {
        let output = self.output(&["push", remote_name, "--tags"])?;
        push_result(remote_name, "--tags", &output)
    }
}

fn push_result(remote: &str, branch: &str, output: &std::process::Output) -> ReleaseResult<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(ReleaseError::Git(GitError::PushFailed {
        remote: remote.to_string(),
        branch: branch.to_string(),
        reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }))
}

/// Parse `name<TAB>unix-time` lines; tags without a date sort as epoch 0
fn parse_tag_lines(stdout: &str) -> Vec<TagInfo> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let (name, created) = line.split_once('\t').unwrap_or((line, ""));
            TagInfo {
                name: name.trim().to_string(),
                created: created.trim().parse().unwrap_or(0),
            }
        })
        .collect()
}
