// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository root discovery.
//!
//! Walks upward from a starting directory until a directory holding a `.git`
//! entry is found. The `.git` entry may be a directory or a file, so work
//! trees and submodules are found too.
//!
//! Failure is handed back as [`RepoNotFound`]. Whether that is fatal is up to
//! the caller: propagate it with `?`, or turn it into `None` with `.ok()`.

use std::path::{absolute, Path, PathBuf};
use tracing::debug;

/// Find nearest enclosing repository root of `start`.
///
/// Checks `start` itself first, then each parent directory in turn.
///
/// # Errors
///
/// - Return [`RepoNotFound`] if no ancestor holds a `.git` entry.
pub fn find_root(start: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start.as_ref();
    let start = absolute(start).unwrap_or_else(|_| start.to_path_buf());

    for dir in start.ancestors() {
        if dir.join(".git").exists() {
            debug!("found repository root at {:?}", dir.display());
            return Ok(dir.to_path_buf());
        }
    }

    Err(RepoNotFound { start })
}

/// No repository encloses the starting directory.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("no git repository at or above {:?}", start.display())]
pub struct RepoNotFound {
    pub start: PathBuf,
}

/// Friendly result alias :3
pub type Result<T, E = RepoNotFound> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;
    use std::fs::{create_dir_all, write};

    #[test_case(0; "at root")]
    #[test_case(1; "one level")]
    #[test_case(5; "five levels")]
    #[test]
    fn find_root_from_nested_dir(depth: usize) -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("repo");
        create_dir_all(root.join(".git"))?;

        let mut start = root.clone();
        for level in 0..depth {
            start = start.join(format!("level{level}"));
        }
        create_dir_all(&start)?;

        pretty_assertions::assert_eq!(find_root(&start)?, root);

        Ok(())
    }

    #[test]
    fn find_root_accepts_git_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("worktree");
        create_dir_all(root.join("src"))?;
        write(root.join(".git"), "gitdir: /elsewhere/.git/worktrees/x\n")?;

        pretty_assertions::assert_eq!(find_root(root.join("src"))?, root);

        Ok(())
    }

    #[test]
    fn find_root_prefers_nearest() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let outer = dir.path().join("outer");
        let inner = outer.join("vendor").join("inner");
        create_dir_all(outer.join(".git"))?;
        create_dir_all(inner.join(".git"))?;

        pretty_assertions::assert_eq!(find_root(&inner)?, inner);
        pretty_assertions::assert_eq!(find_root(outer.join("vendor"))?, outer);

        Ok(())
    }

    // NOTE: Relies on the temporary directory not living inside a repository.
    #[sealed_test]
    fn find_root_relative_start_is_made_absolute() -> anyhow::Result<()> {
        create_dir_all("project/.git")?;
        create_dir_all("project/docs")?;

        let result = find_root("project/docs")?;
        pretty_assertions::assert_eq!(result, std::env::current_dir()?.join("project"));

        let error = find_root("elsewhere").unwrap_err();
        assert!(error.start.is_absolute());

        Ok(())
    }
}
