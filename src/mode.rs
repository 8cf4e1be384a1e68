// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Run mode selection.
//!
//! The run mode decides how the workspace gets its source checkout:
//!
//! - __ci__: an outside checkout step already populated the workspace.
//! - __dev__: snapshot a local development repository, including its
//!   uncommitted tracked changes.
//! - __download__: clone the source repository from its URL.
//!
//! The user may also ask for __auto__, in which case jwalci looks at how it
//! was started. A program streamed into the process has no meaningful local
//! repository of its own, so that check comes before repository discovery.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};
use tracing::debug;

/// Resolved run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Ci,
    Dev,
    Download,
}

impl Display for RunMode {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Ci => fmt.write_str("ci"),
            Self::Dev => fmt.write_str("dev"),
            Self::Download => fmt.write_str("download"),
        }
    }
}

/// Run mode requested by the user.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ModeSelect {
    #[default]
    Auto,
    Explicit(RunMode),
}

/// Resolve requested mode into a concrete run mode.
///
/// An explicit mode always wins. Under [`ModeSelect::Auto`]:
///
/// 1. Not started from a saved executable? Then [`RunMode::Download`].
/// 2. `locate` finds a repository root? Then [`RunMode::Dev`].
/// 3. Otherwise [`RunMode::Ci`].
///
/// `locate` is only called when the first two checks leave it undecided.
pub fn resolve<F>(select: ModeSelect, invoked_from_saved_file: bool, locate: F) -> RunMode
where
    F: FnOnce() -> Option<PathBuf>,
{
    let mode = match select {
        ModeSelect::Explicit(mode) => mode,
        ModeSelect::Auto if !invoked_from_saved_file => RunMode::Download,
        ModeSelect::Auto => match locate() {
            Some(root) => {
                debug!("running inside repository {:?}", root.display());
                RunMode::Dev
            }
            None => RunMode::Ci,
        },
    };
    debug!("resolved run mode {mode} from {select:?}");

    mode
}

/// Check if current process runs from an executable saved on disk.
///
/// Streamed programs run from an anonymous in-memory file, or from a file
/// that was unlinked right after launch. Neither is a regular file by the
/// time we look.
pub fn invoked_from_saved_file() -> bool {
    match std::env::current_exe() {
        Ok(exe) => exe.is_file() && !exe.to_string_lossy().contains("memfd:"),
        Err(_) => false,
    }
}
