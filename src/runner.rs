// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command execution.
//!
//! Every external tool the pipeline calls is described by an [`Invocation`].
//! The working directory and the Python environment to activate are fields of
//! the invocation, never changes to this process. At the process boundary the
//! command is wrapped in a small bash script that changes directory, sources
//! the environment's activation script, and then execs the real program.

use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{info, instrument};

const WRAPPER: &str = r#"cd "$1" && shift && exec "$@""#;
const ACTIVATING_WRAPPER: &str = r#"cd "$1" && . "$2/bin/activate" && shift 2 && exec "$@""#;

/// Single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
    cwd: PathBuf,
    virtualenv: Option<PathBuf>,
}

impl Invocation {
    /// Construct new invocation of `program` inside `cwd`.
    pub fn new(program: impl Into<OsString>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            virtualenv: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a listing of arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Activate Python environment at `virtualenv` before running.
    pub fn activate(mut self, virtualenv: impl Into<PathBuf>) -> Self {
        self.virtualenv = Some(virtualenv.into());
        self
    }

    pub fn cwd(&self) -> &Path {
        self.cwd.as_path()
    }

    pub fn virtualenv(&self) -> Option<&Path> {
        self.virtualenv.as_deref()
    }

    /// Build process command that runs this invocation through bash.
    pub fn to_command(&self) -> Command {
        let mut command = Command::new("bash");
        command.arg("-c");
        match &self.virtualenv {
            Some(virtualenv) => {
                command
                    .arg(ACTIVATING_WRAPPER)
                    .arg("-")
                    .arg(&self.cwd)
                    .arg(virtualenv);
            }
            None => {
                command.arg(WRAPPER).arg("-").arg(&self.cwd);
            }
        }
        command.arg(&self.program).args(&self.args);

        command
    }
}

impl Display for Invocation {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(fmt, " {}", arg.to_string_lossy())?;
        }

        Ok(())
    }
}

/// Run external commands.
pub trait CommandRunner {
    /// Run invocation to completion.
    ///
    /// # Errors
    ///
    /// - Return [`RunError`] if the command cannot be started, or exits
    ///   unsuccessfully.
    fn run(&self, invocation: &Invocation) -> Result<()>;
}

impl<R> CommandRunner for &R
where
    R: CommandRunner + ?Sized,
{
    fn run(&self, invocation: &Invocation) -> Result<()> {
        (**self).run(invocation)
    }
}

/// Run commands through bash with inherited standard streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl ShellRunner {
    /// Construct new shell runner.
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ShellRunner {
    #[instrument(skip(self, invocation), fields(cwd = %invocation.cwd.display()), level = "debug")]
    fn run(&self, invocation: &Invocation) -> Result<()> {
        info!("run {invocation}");
        let status = invocation
            .to_command()
            .spawn()
            .and_then(|mut child| child.wait())
            .map_err(|err| RunError::Spawn {
                source: err,
                command: invocation.to_string(),
            })?;

        if !status.success() {
            return Err(RunError::Failed {
                command: invocation.to_string(),
                code: status.code(),
            });
        }

        Ok(())
    }
}

/// Command execution error types.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Command could not be started or waited on.
    #[error("failed to run {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// Command exited unsuccessfully.
    #[error("command {command:?} failed with {}", describe_exit(.code))]
    Failed { command: String, code: Option<i32> },
}

impl RunError {
    /// Process exit status to report for this error.
    ///
    /// Mirrors the failed command's own exit code where there is one.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Failed {
                code: Some(code), ..
            } => *code,
            _ => 1,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".to_string(),
    }
}

/// Friendly result alias :3
pub type Result<T, E = RunError> = std::result::Result<T, E>;
