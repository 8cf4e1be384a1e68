// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use jwalci::{
    config,
    locate::find_root,
    mode::{self, invoked_from_saved_file},
    path::default_config_path,
    pipeline::{PipelineError, DEFAULT_COUCHDB_URL, DEFAULT_SAUCELABS_URL},
    runner::RunError,
    stage::DEFAULT_GIT_URL,
    Configuration, Git2SourceControl, ModeSelect, PipelineOptions, PipelineRunner, RunMode,
    ShellRunner, StageRequest, Stager,
};

use anyhow::Result;
use clap::Parser;
use std::{env::current_dir, path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Stage a jwallib workspace, run its tests, and optionally deploy it.
#[derive(Debug, Clone, Parser)]
#[command(about, override_usage = "jwalci [options]", version)]
struct Cli {
    /// Configuration as inline JSON, "json:<json>", "file:<path>", or a path.
    #[arg(long, value_name = "source")]
    pub config: Option<String>,

    /// Remote Selenium grid for integration tests.
    #[arg(long, value_name = "url", default_value = DEFAULT_SAUCELABS_URL)]
    pub saucelabs_url: String,

    /// Home directory to use instead of a temporary one.
    #[arg(long, value_name = "path")]
    pub home_dir: Option<PathBuf>,

    /// Source checkout already exists in the home directory.
    #[arg(long, group = "mode")]
    pub ci_mode: bool,

    /// Snapshot a local development repository, uncommitted changes included.
    #[arg(long, group = "mode")]
    pub dev_mode: bool,

    /// Pick a mode based on how jwalci was started (default).
    #[arg(long, group = "mode")]
    pub auto_mode: bool,

    /// Clone the source repository from its URL.
    #[arg(long, group = "mode")]
    pub download_mode: bool,

    /// Development repository to snapshot in dev mode.
    #[arg(long, value_name = "path")]
    pub development_repository: Option<PathBuf>,

    /// Source checkout path to use instead of "<home>/git/jwallib".
    #[arg(long, value_name = "path")]
    pub git_working_copy: Option<PathBuf>,

    /// URL to clone in download mode.
    #[arg(long, value_name = "url", default_value = DEFAULT_GIT_URL)]
    pub git_url: String,

    /// CouchDB server for test and deploy databases.
    #[arg(long, value_name = "url", default_value = DEFAULT_COUCHDB_URL)]
    pub couchdb_url: String,

    /// Database to deploy into.
    #[arg(long, value_name = "url")]
    pub couchdb_deploy_url: Option<String>,

    /// Database for integration tests.
    #[arg(long, value_name = "url")]
    pub couchdb_test_url: Option<String>,

    /// Deploy after tests pass.
    #[arg(long)]
    pub deploy: bool,

    /// Keep temporary home directory after the run.
    #[arg(long)]
    pub keep_home: bool,
}

impl Cli {
    fn mode_select(&self) -> ModeSelect {
        if self.auto_mode {
            ModeSelect::Auto
        } else if self.ci_mode {
            ModeSelect::Explicit(RunMode::Ci)
        } else if self.dev_mode {
            ModeSelect::Explicit(RunMode::Dev)
        } else if self.download_mode {
            ModeSelect::Explicit(RunMode::Download)
        } else {
            ModeSelect::Auto
        }
    }

    fn stage_request(&self, mode: RunMode, config: &Configuration, cwd: PathBuf) -> StageRequest {
        StageRequest {
            mode,
            home_dir: self.home_dir.clone(),
            development_repository: self.development_repository.clone(),
            git_working_copy: self.git_working_copy.clone(),
            git_url: Some(config.rewrite_url(&self.git_url)),
            keep_home: self.keep_home,
            current_dir: cwd,
        }
    }

    fn run(self) -> Result<()> {
        let config = config::load(self.config.as_deref(), &default_config_path()?)?;
        let cwd = current_dir()?;

        let mode = mode::resolve(self.mode_select(), invoked_from_saved_file(), || {
            find_root(&cwd).ok()
        });
        info!("run mode is {mode}");

        let request = self.stage_request(mode, &config, cwd);
        let workspace = Stager::new(Git2SourceControl::new()).stage(request)?;

        let options = PipelineOptions {
            couchdb_url: self.couchdb_url,
            couchdb_test_url: self.couchdb_test_url,
            couchdb_deploy_url: self.couchdb_deploy_url,
            saucelabs_url: self.saucelabs_url,
            deploy: self.deploy,
        };
        PipelineRunner::new(ShellRunner::new()).run(&workspace, &config, &options)?;

        Ok(())
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    // INVARIANT: Workspace is dropped inside run(), before exit skips destructors.
    if let Err(error) = Cli::parse().run() {
        error!("{error:?}");
        exit(exit_code(&error));
    }

    exit(0)
}

fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .chain()
        .find_map(|cause| {
            cause
                .downcast_ref::<PipelineError>()
                .map(PipelineError::exit_code)
                .or_else(|| cause.downcast_ref::<RunError>().map(RunError::exit_code))
        })
        .unwrap_or(1)
}
