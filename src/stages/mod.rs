//! The four pipeline stages. Each one is a [`StageProcessor`] plus a `run`
//! entry point that loads configuration, checks preconditions, enumerates
//! work items and reports whether the stage succeeded.
//!
//! [`StageProcessor`]: crate::batch::StageProcessor

pub mod clone;
pub mod discover;
pub mod overrides;
pub mod pull;

use anyhow::{bail, Result};
use log::error;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

use crate::batch::StageReport;
use crate::config::Config;
use crate::output;
use crate::process::{ProcessRunner, TokioProcessRunner};

pub fn production_runner() -> Arc<dyn ProcessRunner> {
    Arc::new(TokioProcessRunner)
}

/// Logs and prints the stage summary; returns the stage's success flag.
fn finish<T: Display>(report: &StageReport<T>) -> bool {
    report.log_summary();
    output::print_failures(report);
    report.is_success()
}

/// The repos directory, which must already have been created by the clone stage.
fn existing_repos_dir(config: &Config) -> Result<PathBuf> {
    let repos_dir = config.repos_dir();
    if !repos_dir.is_dir() {
        error!("Please run the clone stage first to clone repositories");
        bail!("Repos directory does not exist: {}", repos_dir.display());
    }
    Ok(repos_dir)
}
