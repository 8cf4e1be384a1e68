// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Continuous integration driver for jwallib.
//!
//! A run of jwalci goes through four stages:
//!
//! 1. Load configuration, see [`config`].
//! 2. Resolve the run mode, see [`mode`].
//! 3. Stage a workspace holding the source checkout, see [`stage`].
//! 4. Run the test and deployment pipeline in that workspace, see
//!    [`pipeline`].
//!
//! # Run Modes
//!
//! The run mode picks where the source checkout comes from. On a CI server
//! the checkout already exists. On a developer machine jwalci snapshots the
//! local repository, uncommitted edits included, without ever touching it.
//! When jwalci is streamed in from elsewhere, it downloads the source itself.
//!
//! # See Also
//!
//! 1. [`locate`] for repository discovery.
//! 2. [`rewrite`] for URL rewriting.
//! 3. [`runner`] for how external tools are called.

pub mod config;
pub mod locate;
pub mod mode;
pub mod path;
pub mod pipeline;
pub mod rewrite;
pub mod runner;
pub mod scm;
pub mod stage;

pub use config::Configuration;
pub use mode::{ModeSelect, RunMode};
pub use pipeline::{PipelineOptions, PipelineRunner};
pub use runner::ShellRunner;
pub use scm::{Git2SourceControl, SourceControl};
pub use stage::{StageRequest, Stager, Workspace};
