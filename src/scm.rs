// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source control capability.
//!
//! Workspace staging needs a handful of repository operations: clone, status,
//! diff, apply, commit, and locating a repository root. They sit behind the
//! [`SourceControl`] trait so staging logic never names a backend directly.
//! [`Git2SourceControl`] is the default backend, built on libgit2.
//!
//! # Patch Relay
//!
//! The diff and apply operations exist to carry uncommitted edits out of a
//! development repository and into a disposable clone. The diff covers
//! tracked files only, comparing `HEAD` against the index and working tree
//! together. Untracked files are never part of a [`Patch`].

pub mod prompt;

use crate::{
    locate::{self, RepoNotFound},
    scm::prompt::IndicatifPrompter,
};

use auth_git2::GitAuthenticator;
use git2::{
    build::RepoBuilder, ApplyLocation, Config, Diff, DiffFormat, DiffOptions, FetchOptions,
    RemoteCallbacks, Repository, Signature, StatusOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
    time,
};
use tracing::{debug, info, instrument};

/// Repository operations needed for workspace staging.
pub trait SourceControl {
    /// Clone repository at `url` into `dest`.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;

    /// List paths with any working tree or index status, untracked included.
    fn status(&self, repo: &Path) -> Result<Vec<PathBuf>>;

    /// Produce patch of tracked changes relative to `HEAD`.
    fn diff(&self, repo: &Path) -> Result<Patch>;

    /// Apply patch to both index and working tree.
    fn apply(&self, repo: &Path, patch: &Patch) -> Result<()>;

    /// Commit current index onto `HEAD`, returning new commit id.
    fn commit(&self, repo: &Path, author: &Author, message: &str) -> Result<String>;

    /// Find nearest enclosing repository root.
    fn find_root(&self, start: &Path) -> Result<PathBuf, RepoNotFound> {
        locate::find_root(start)
    }
}

/// Unified diff content.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Patch(Vec<u8>);

impl Patch {
    /// Construct new patch from raw diff bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Check if patch carries no changes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Treat patch as byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

/// Commit identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    /// Construct new commit identity.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Source control through libgit2.
#[derive(Debug, Default)]
pub struct Git2SourceControl;

impl Git2SourceControl {
    /// Construct new libgit2 backend.
    pub fn new() -> Self {
        Self
    }
}

impl SourceControl for Git2SourceControl {
    /// Clone repository at `url` into `dest`.
    ///
    /// The progress of the clone is displayed through a progress bar. If
    /// credentials are needed, then the user is prompted for them while the
    /// progress bar is suspended.
    ///
    /// # Errors
    ///
    /// - Return [`ScmError::Git2`] if libgit2 operations fail.
    /// - Return [`ScmError::CreateDir`] if parent of `dest` cannot be created.
    #[instrument(skip(self), level = "debug")]
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        info!("clone {url:?} into {:?}", dest.display());
        if let Some(parent) = dest.parent() {
            create_dir_all(parent).map_err(|err| ScmError::CreateDir {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        bar.set_style(style);
        bar.set_message(url.to_string());
        bar.enable_steady_tick(time::Duration::from_millis(100));

        let prompter = IndicatifPrompter::new(bar);
        let authenticator = GitAuthenticator::default().set_prompter(prompter.clone());
        let config = Config::open_default()?;

        let mut throttle = time::Instant::now();
        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        rc.transfer_progress(|progress| {
            let stats = progress.to_owned();
            if throttle.elapsed() > time::Duration::from_millis(10) {
                throttle = time::Instant::now();
                prompter.bar.set_length(stats.total_objects() as u64);
                prompter.bar.set_position(stats.received_objects() as u64);
            }
            true
        });

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);
        let result = RepoBuilder::new().fetch_options(fo).clone(url, dest);
        prompter.bar.finish_and_clear();
        result?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn status(&self, repo: &Path) -> Result<Vec<PathBuf>> {
        let repository = Repository::open(repo)?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).include_ignored(false);

        let statuses = repository.statuses(Some(&mut opts))?;
        let paths = statuses
            .iter()
            .filter_map(|entry| entry.path().map(PathBuf::from))
            .collect::<Vec<_>>();
        debug!("{} paths with status", paths.len());

        Ok(paths)
    }

    #[instrument(skip(self), level = "debug")]
    fn diff(&self, repo: &Path) -> Result<Patch> {
        let repository = Repository::open(repo)?;
        let head = repository.head()?.peel_to_tree()?;
        let mut opts = DiffOptions::new();
        opts.show_binary(true);

        // INVARIANT: Tracked files only, staged and unstaged edits together.
        let diff = repository.diff_tree_to_workdir_with_index(Some(&head), Some(&mut opts))?;

        let mut bytes = Vec::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            // Content lines need their origin marker put back in front.
            if matches!(line.origin(), '+' | '-' | ' ') {
                bytes.push(line.origin() as u8);
            }
            bytes.extend_from_slice(line.content());
            true
        })?;

        Ok(Patch::new(bytes))
    }

    #[instrument(skip(self, patch), level = "debug")]
    fn apply(&self, repo: &Path, patch: &Patch) -> Result<()> {
        let repository = Repository::open(repo)?;
        let diff = Diff::from_buffer(patch.as_bytes())?;
        repository.apply(&diff, ApplyLocation::Both, None)?;

        Ok(())
    }

    #[instrument(skip(self, message), level = "debug")]
    fn commit(&self, repo: &Path, author: &Author, message: &str) -> Result<String> {
        let repository = Repository::open(repo)?;

        // INVARIANT: Always use new tree produced by the on-disk index.
        let mut index = repository.index()?;
        index.read(true)?;
        let tree_oid = index.write_tree()?;
        let tree = repository.find_tree(tree_oid)?;

        let signature = Signature::now(&author.name, &author.email)?;
        let parent = repository.head()?.peel_to_commit()?;
        let oid = repository.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &[&parent],
        )?;
        info!("committed {oid} in {:?}", repo.display());

        Ok(oid.to_string())
    }
}

/// Source control error types.
#[derive(Debug, thiserror::Error)]
pub enum ScmError {
    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Clone destination parent cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ScmError> = std::result::Result<T, E>;
