// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Test and deployment pipeline.
//!
//! Once a workspace is staged, the pipeline runs a fixed sequence of external
//! commands against it:
//!
//! 1. Create the Python environment and install packages, if missing.
//! 2. Print tool versions, recent history, and branches.
//! 3. Run unit tests.
//! 4. Run integration tests against CouchDB and a remote Selenium grid.
//! 5. Optionally sync the source tree into CouchDB and push the couchapp.
//!
//! The first failing command aborts the run. Nothing is retried or rolled
//! back.

use crate::{
    config::Configuration,
    runner::{CommandRunner, Invocation, RunError},
    stage::Workspace,
};

use tracing::{info, instrument};

/// Packages installed into a fresh Python environment.
pub const PACKAGES: [&str; 3] = ["couchapp", "pycurl", "selenium"];

/// Default CouchDB server.
pub const DEFAULT_COUCHDB_URL: &str = "http://localhost:5984/";

/// Default remote Selenium grid.
pub const DEFAULT_SAUCELABS_URL: &str = "http://ondemand.saucelabs.com:80/wd/hub";

const UNIT_TESTS: &str = "test_jwalutil.py";
const INTEGRATION_TESTS: &str = "test_gitbrowser.py";
const TREE_SYNC: &str = "gitcouchdbsync.py";
const COUCHAPP_DIR: &str = "gitbrowser";
const TEST_DATABASE: &str = "gitbrowser-testing";
const DEPLOY_DATABASE: &str = "gitbrowser";

/// Endpoints and switches for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// CouchDB server the test and deploy databases live on.
    pub couchdb_url: String,

    /// Database for integration tests, instead of one on `couchdb_url`.
    pub couchdb_test_url: Option<String>,

    /// Database to deploy into, instead of one on `couchdb_url`.
    pub couchdb_deploy_url: Option<String>,

    /// Remote Selenium grid.
    pub saucelabs_url: String,

    /// Deploy after tests pass.
    pub deploy: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            couchdb_url: DEFAULT_COUCHDB_URL.into(),
            couchdb_test_url: None,
            couchdb_deploy_url: None,
            saucelabs_url: DEFAULT_SAUCELABS_URL.into(),
            deploy: false,
        }
    }
}

impl PipelineOptions {
    /// Database URL for integration tests.
    pub fn test_url(&self) -> String {
        self.couchdb_test_url
            .clone()
            .unwrap_or_else(|| join_url(&self.couchdb_url, TEST_DATABASE))
    }

    /// Database URL to deploy into.
    pub fn deploy_url(&self) -> String {
        self.couchdb_deploy_url
            .clone()
            .unwrap_or_else(|| join_url(&self.couchdb_url, DEPLOY_DATABASE))
    }
}

/// Join URL base and path segment with exactly one slash.
pub fn join_url(base: &str, segment: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        segment.trim_start_matches('/')
    )
}

/// Run pipeline steps through a command runner.
#[derive(Debug, Default)]
pub struct PipelineRunner<R>
where
    R: CommandRunner,
{
    runner: R,
}

impl<R> PipelineRunner<R>
where
    R: CommandRunner,
{
    /// Construct new pipeline runner.
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Run whole pipeline against staged workspace.
    ///
    /// # Errors
    ///
    /// - Return [`PipelineError::Step`] for the first command that fails.
    #[instrument(skip_all, fields(home = %workspace.home_dir().display()), level = "debug")]
    pub fn run(
        &self,
        workspace: &Workspace,
        config: &Configuration,
        options: &PipelineOptions,
    ) -> Result<()> {
        self.provision(workspace)?;
        self.diagnostics(workspace)?;
        self.unit_tests(workspace)?;
        self.integration_tests(workspace, config, options)?;

        if options.deploy {
            self.deploy(workspace, &options.deploy_url())?;
        }

        info!("pipeline finished");
        Ok(())
    }

    fn provision(&self, workspace: &Workspace) -> Result<()> {
        let virtualenv = workspace.virtualenv_path();
        if virtualenv.exists() {
            info!("reusing python environment {:?}", virtualenv.display());
            return Ok(());
        }

        self.step(
            "provision",
            Invocation::new("virtualenv", workspace.home_dir()).arg(&virtualenv),
        )?;
        self.step(
            "provision",
            Invocation::new("pip", workspace.home_dir())
                .arg("install")
                .args(PACKAGES)
                .activate(&virtualenv),
        )
    }

    fn diagnostics(&self, workspace: &Workspace) -> Result<()> {
        let in_checkout = |program: &str| {
            Invocation::new(program, workspace.git_path()).activate(workspace.virtualenv_path())
        };

        self.step("diagnostics", in_checkout("python").arg("--version"))?;
        self.step("diagnostics", in_checkout("git").args(["log", "--max-count=3"]))?;
        self.step("diagnostics", in_checkout("git").args(["branch", "-a"]))
    }

    fn unit_tests(&self, workspace: &Workspace) -> Result<()> {
        self.step(
            "unit tests",
            Invocation::new("python", workspace.git_path())
                .arg(UNIT_TESTS)
                .activate(workspace.virtualenv_path()),
        )
    }

    fn integration_tests(
        &self,
        workspace: &Workspace,
        config: &Configuration,
        options: &PipelineOptions,
    ) -> Result<()> {
        let couchdb_url = config.rewrite_url(options.test_url());
        let saucelabs_url = config.rewrite_url(&options.saucelabs_url);

        self.step(
            "integration tests",
            Invocation::new("python", workspace.git_path())
                .arg(INTEGRATION_TESTS)
                .args(["--couchdb-url", couchdb_url.as_str()])
                .args(["--saucelabs-url", saucelabs_url.as_str()])
                .activate(workspace.virtualenv_path()),
        )
    }

    fn deploy(&self, workspace: &Workspace, deploy_url: &str) -> Result<()> {
        info!("deploying to {deploy_url}");
        self.step(
            "deploy",
            Invocation::new("python", workspace.git_path())
                .arg(TREE_SYNC)
                .arg(workspace.git_path())
                .arg(deploy_url)
                .activate(workspace.virtualenv_path()),
        )?;
        self.step(
            "deploy",
            Invocation::new("couchapp", workspace.git_path())
                .args(["push", COUCHAPP_DIR, deploy_url])
                .activate(workspace.virtualenv_path()),
        )
    }

    fn step(&self, step: &'static str, invocation: Invocation) -> Result<()> {
        self.runner
            .run(&invocation)
            .map_err(|err| PipelineError::Step { step, source: err })
    }
}

/// Pipeline error types.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A pipeline step's command failed.
    #[error("pipeline step {step:?} failed")]
    Step {
        step: &'static str,
        #[source]
        source: RunError,
    },
}

impl PipelineError {
    /// Process exit status to report for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Step { source, .. } => source.exit_code(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
