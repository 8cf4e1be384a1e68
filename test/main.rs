// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use git2::{Oid, Repository, RepositoryInitOptions, StatusOptions};
use std::{
    fs::{create_dir_all, write},
    path::{Path, PathBuf},
};

/// Normal repository with a working tree, for use as a development repository.
pub(crate) struct RepoFixture {
    repo: Repository,
}

impl RepoFixture {
    pub(crate) fn new(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(path.as_ref(), &opts)?;

        // INVARIANT: Always provide valid name and email.
        //   - Git will complain if this is not set in CI/CD environments.
        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;

        Ok(Self { repo })
    }

    pub(crate) fn path(&self) -> PathBuf {
        self.repo
            .workdir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.repo.path().to_path_buf())
    }

    /// Write file into working tree without staging it.
    pub(crate) fn write(&self, filename: impl AsRef<Path>, contents: impl AsRef<str>) -> Result<()> {
        let full_path = self.path().join(filename.as_ref());
        if let Some(parent) = full_path.parent() {
            create_dir_all(parent)?;
        }
        write(full_path, contents.as_ref())?;

        Ok(())
    }

    pub(crate) fn stage_and_commit(
        &self,
        filename: impl AsRef<Path>,
        contents: impl AsRef<str>,
    ) -> Result<Oid> {
        self.write(filename.as_ref(), contents)?;

        // INVARIANT: Always use new tree produced by index after staging new entry.
        let mut index = self.repo.index()?;
        index.add_path(filename.as_ref())?;
        index.write()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;

        // INVARIANT: Always determine latest parent commits to append to.
        let signature = self.repo.signature()?;
        let mut parents = Vec::new();
        if let Ok(head) = self.repo.head() {
            parents.push(head.peel_to_commit()?);
        }
        let parents = parents.iter().collect::<Vec<_>>();

        // INVARIANT: Commit to HEAD by appending to obtained parent commits.
        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            format!("chore: add {:?}", filename.as_ref()).as_ref(),
            &tree,
            &parents,
        )?;

        Ok(oid)
    }

    pub(crate) fn head(&self) -> Result<Oid> {
        Ok(self.repo.head()?.peel_to_commit()?.id())
    }

    pub(crate) fn status_count(&self) -> Result<usize> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true);
        Ok(self.repo.statuses(Some(&mut opts))?.len())
    }
}
