// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Workspace staging.
//!
//! A __workspace__ is the home directory that a pipeline run works in. It
//! holds the source checkout at `git/jwallib`, and the isolated Python
//! environment at `virtualenv`.
//!
//! # Home Directory Ownership
//!
//! A home directory given by the caller is used as-is, and is never deleted.
//! Otherwise jwalci creates a fresh temporary directory that belongs to the
//! [`Workspace`] and is removed when the workspace is dropped, whether the run
//! succeeded or not. In ci mode without a given home directory, the current
//! directory is the home directory, since a CI server has already checked the
//! source out there.
//!
//! # Staging by Run Mode
//!
//! - __download__: clone the source URL into the checkout path.
//! - __dev__: clone a local development repository, then relay its
//!   uncommitted tracked changes as one throwaway commit in the clone. The
//!   development repository itself is only ever read.
//! - __ci__: nothing to do.
//!
//! Download and dev staging are skipped when the checkout path already
//! exists, so rerunning with the same home directory reuses the checkout.

use crate::{
    locate::RepoNotFound,
    mode::RunMode,
    scm::{Author, Git2SourceControl, ScmError, SourceControl},
};

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

/// Name of committer used for relayed changes.
pub const SNAPSHOT_AUTHOR_NAME: &str = "jwalci";

/// Email of committer used for relayed changes.
pub const SNAPSHOT_AUTHOR_EMAIL: &str = "jwalci@localhost";

/// Commit message used for relayed changes.
pub const SNAPSHOT_MESSAGE: &str = "Snapshot of uncommitted changes";

/// Upstream jwallib repository cloned in download mode.
pub const DEFAULT_GIT_URL: &str = "https://github.com/jwal/jwallib";

/// Home directory of a workspace.
#[derive(Debug)]
pub enum HomeDir {
    /// Directory owned by someone else. Never deleted.
    Provided(PathBuf),

    /// Directory owned by jwalci. Deleted on drop.
    Temporary(TempDir),
}

impl HomeDir {
    /// Create fresh temporary home directory.
    ///
    /// # Errors
    ///
    /// - Return [`StageError::TempDir`] if the directory cannot be created.
    pub fn temporary() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("jwalci-")
            .tempdir()
            .map_err(StageError::TempDir)?;
        debug!("created temporary home {:?}", dir.path().display());

        Ok(Self::Temporary(dir))
    }

    /// Stop home directory from being deleted on drop.
    pub fn keep(self) -> Self {
        match self {
            Self::Temporary(dir) => {
                let path = dir.keep();
                info!("keeping home directory {:?}", path.display());
                Self::Provided(path)
            }
            provided => provided,
        }
    }

    /// Treat home directory as [`Path`] slice.
    pub fn as_path(&self) -> &Path {
        match self {
            Self::Provided(path) => path.as_path(),
            Self::Temporary(dir) => dir.path(),
        }
    }
}

/// Staged workspace.
#[derive(Debug)]
pub struct Workspace {
    home: HomeDir,
    git_path: PathBuf,
}

impl Workspace {
    /// Construct new workspace.
    ///
    /// Source checkout defaults to `git/jwallib` under the home directory.
    pub fn new(home: HomeDir, git_path: Option<PathBuf>) -> Self {
        let git_path = git_path.unwrap_or_else(|| home.as_path().join("git").join("jwallib"));
        Self { home, git_path }
    }

    /// Home directory of workspace.
    pub fn home_dir(&self) -> &Path {
        self.home.as_path()
    }

    /// Path to source checkout.
    pub fn git_path(&self) -> &Path {
        self.git_path.as_path()
    }

    /// Path to isolated Python environment.
    pub fn virtualenv_path(&self) -> PathBuf {
        self.home.as_path().join("virtualenv")
    }
}

/// Everything needed to stage a workspace.
#[derive(Debug, Clone)]
pub struct StageRequest {
    /// Resolved run mode.
    pub mode: RunMode,

    /// Home directory to use instead of a temporary one.
    pub home_dir: Option<PathBuf>,

    /// Development repository to snapshot in dev mode.
    pub development_repository: Option<PathBuf>,

    /// Source checkout path to use instead of the default layout.
    pub git_working_copy: Option<PathBuf>,

    /// URL to clone from in download mode.
    pub git_url: Option<String>,

    /// Keep temporary home directory after the run.
    pub keep_home: bool,

    /// Directory relative paths are resolved against.
    pub current_dir: PathBuf,
}

/// Stage workspaces through a source control backend.
#[derive(Debug, Default)]
pub struct Stager<S = Git2SourceControl>
where
    S: SourceControl,
{
    scm: S,
}

impl<S> Stager<S>
where
    S: SourceControl,
{
    /// Construct new stager.
    pub fn new(scm: S) -> Self {
        Self { scm }
    }

    /// Stage workspace for given run mode.
    ///
    /// # Errors
    ///
    /// - Return [`StageError::TempDir`] if temporary home cannot be created.
    /// - Return [`StageError::MissingGitUrl`] if download mode lacks a URL, or
    ///   the URL is blank.
    /// - Return [`StageError::NotFound`] if dev mode cannot find a
    ///   development repository.
    /// - Return [`StageError::SelfClone`] if development repository and
    ///   checkout path contain one another.
    /// - Return [`StageError::Scm`] if source control operations fail.
    #[instrument(skip(self, request), fields(mode = %request.mode), level = "debug")]
    pub fn stage(&self, request: StageRequest) -> Result<Workspace> {
        let cwd = request.current_dir.as_path();
        let home = match (&request.home_dir, request.mode) {
            (Some(path), _) => HomeDir::Provided(cwd.join(path)),
            (None, RunMode::Ci) => HomeDir::Provided(cwd.to_path_buf()),
            (None, _) => HomeDir::temporary()?,
        };
        let home = if request.keep_home { home.keep() } else { home };

        let git_path = request.git_working_copy.as_ref().map(|path| cwd.join(path));
        let workspace = Workspace::new(home, git_path);
        info!("staging {} workspace in {:?}", request.mode, workspace.home_dir().display());

        // INVARIANT: Any early return drops the workspace, removing a temporary home.
        match request.mode {
            RunMode::Download => self.stage_download(&workspace, request.git_url.as_deref())?,
            RunMode::Dev => {
                self.stage_dev(&workspace, request.development_repository.as_deref(), cwd)?
            }
            RunMode::Ci => {
                if !workspace.git_path().exists() {
                    warn!(
                        "ci mode expects an existing checkout at {:?}",
                        workspace.git_path().display()
                    );
                }
            }
        }

        Ok(workspace)
    }

    fn stage_download(&self, workspace: &Workspace, git_url: Option<&str>) -> Result<()> {
        let git_path = workspace.git_path();
        if git_path.exists() {
            info!("checkout {:?} already present", git_path.display());
            return Ok(());
        }

        let url = git_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(StageError::MissingGitUrl)?;
        self.scm.clone_repo(url, git_path)?;

        Ok(())
    }

    fn stage_dev(
        &self,
        workspace: &Workspace,
        development_repository: Option<&Path>,
        cwd: &Path,
    ) -> Result<()> {
        let git_path = workspace.git_path();
        if git_path.exists() {
            info!("checkout {:?} already present", git_path.display());
            return Ok(());
        }

        let source = match development_repository {
            Some(path) => cwd.join(path),
            None => self.scm.find_root(cwd)?,
        };
        check_self_clone(&source, git_path)?;

        self.scm.clone_repo(&source.to_string_lossy(), git_path)?;

        if self.scm.status(&source)?.is_empty() {
            info!("no uncommitted changes in {:?}", source.display());
            return Ok(());
        }

        // NOTE: Untracked files never make it into the patch.
        let patch = self.scm.diff(&source)?;
        if patch.is_empty() {
            warn!(
                "only untracked files differ in {:?}, nothing to relay",
                source.display()
            );
            return Ok(());
        }

        self.scm.apply(git_path, &patch)?;
        let author = Author::new(SNAPSHOT_AUTHOR_NAME, SNAPSHOT_AUTHOR_EMAIL);
        self.scm.commit(git_path, &author, SNAPSHOT_MESSAGE)?;

        Ok(())
    }
}

/// Refuse to clone a repository into itself, or itself into its checkout.
///
/// # Errors
///
/// - Return [`StageError::SelfClone`] if either path is equal to, or
///   contains, the other.
pub fn check_self_clone(source: &Path, destination: &Path) -> Result<()> {
    let resolved_source = resolve_existing_prefix(source);
    let resolved_destination = resolve_existing_prefix(destination);

    if resolved_source.starts_with(&resolved_destination)
        || resolved_destination.starts_with(&resolved_source)
    {
        return Err(StageError::SelfClone {
            source_repo: source.to_path_buf(),
            destination: destination.to_path_buf(),
        });
    }

    Ok(())
}

// Canonicalize the longest existing ancestor, then append the rest verbatim.
fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut rest = Vec::new();
    loop {
        if let Ok(mut resolved) = existing.canonicalize() {
            resolved.extend(rest.iter().rev());
            return resolved;
        }

        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// Workspace staging error types.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Temporary home directory cannot be created.
    #[error("failed to create temporary home directory")]
    TempDir(#[source] std::io::Error),

    /// Download mode was asked for without a URL to clone.
    #[error("download mode requires a git url")]
    MissingGitUrl,

    /// Development repository and checkout path overlap.
    #[error(
        "refusing to clone {:?} into {:?}, one path contains the other",
        source_repo.display(),
        destination.display()
    )]
    SelfClone {
        source_repo: PathBuf,
        destination: PathBuf,
    },

    /// No development repository could be found.
    #[error(transparent)]
    NotFound(#[from] RepoNotFound),

    /// Source control operations fail.
    #[error(transparent)]
    Scm(#[from] ScmError),
}

/// Friendly result alias :3
pub type Result<T, E = StageError> = std::result::Result<T, E>;
