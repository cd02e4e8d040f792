//! Best-effort git metadata for run manifests.

use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::domain::error::{HarnessError, Result};

/// Commit and working-tree state at the time a run was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitInfo {
    pub commit: String,
    pub dirty: bool,
}

/// HEAD commit SHA of the repository containing `repo_dir`.
pub fn capture_head_sha(repo_dir: &Path) -> Result<String> {
    let stdout = run_git(repo_dir, &["rev-parse", "HEAD"])?;
    if stdout.is_empty() {
        return Err(HarnessError::GitError(
            "git rev-parse HEAD returned empty output".to_string(),
        ));
    }
    Ok(stdout)
}

/// Whether `git status --porcelain` reports any change.
pub fn is_dirty(repo_dir: &Path) -> Result<bool> {
    Ok(!run_git(repo_dir, &["status", "--porcelain"])?.is_empty())
}

/// Whether `dir` sits inside a git work tree (false when git is absent).
pub fn is_git_repo(dir: &Path) -> bool {
    run_git(dir, &["rev-parse", "--is-inside-work-tree"]).is_ok_and(|out| out == "true")
}

/// Commit and dirty flag, or `None` outside a work tree or without git.
pub fn try_git_info(dir: &Path) -> Option<GitInfo> {
    if !is_git_repo(dir) {
        return None;
    }
    let commit = capture_head_sha(dir).ok()?;
    let dirty = is_dirty(dir).ok()?;
    Some(GitInfo { commit, dirty })
}

fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| HarnessError::GitError(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(HarnessError::GitError(format!(
            "git {} failed: {stderr}",
            args.join(" ")
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init"]);
        git(dir.path(), &["config", "user.name", "test-user"]);
        git(dir.path(), &["config", "user.email", "test@example.com"]);
        git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);
        dir
    }

    #[test]
    fn git_info_reports_commit_and_dirty_state() {
        let repo = make_git_repo();
        let info = try_git_info(repo.path()).unwrap();
        assert_eq!(info.commit.len(), 40);
        assert!(!info.dirty);

        std::fs::write(repo.path().join("untracked.txt"), "x").unwrap();
        assert!(try_git_info(repo.path()).unwrap().dirty);
    }

    #[test]
    fn outside_repo_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_git_repo(dir.path()));
        assert!(capture_head_sha(dir.path()).is_err());
        assert_eq!(try_git_info(dir.path()), None);
    }
}
