//! Runs the stages in order as child processes of this executable, stopping
//! at the first stage that exits unsuccessfully.

use anyhow::{Context, Result};
use log::{error, info};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::GENERATED_CONFIG_NAME;
use crate::output;
use crate::process::{ProcessCommand, ProcessRunner};

/// Set on every stage process started by the orchestrator.
pub const CHILD_STAGE_ENV: &str = "TFCOLLECT_PIPELINE_STAGE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discover,
    Clone,
    Override,
    Pull,
}

impl Stage {
    /// Subcommand name, also shown in the pipeline summary.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Discover => "discover",
            Stage::Clone => "clone",
            Stage::Override => "override",
            Stage::Pull => "pull",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage: Stage,
    pub success: bool,
    pub duration: Duration,
}

/// One planned stage invocation: the stage and its command-line arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct StageInvocation {
    pub stage: Stage,
    pub args: Vec<String>,
}

/// Where discovery writes its artifact when run by the orchestrator.
pub fn generated_config_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .join(GENERATED_CONFIG_NAME)
}

/// Builds the ordered stage list. With `discover`, discovery runs first and
/// the remaining stages read the artifact it generates.
pub fn plan(config_path: &Path, discover: bool) -> Vec<StageInvocation> {
    let config_arg = config_path.display().to_string();
    let mut invocations = Vec::new();

    let stage_config = if discover {
        let generated = generated_config_path(config_path).display().to_string();
        invocations.push(StageInvocation {
            stage: Stage::Discover,
            args: vec![
                Stage::Discover.name().to_string(),
                config_arg,
                "--output".to_string(),
                generated.clone(),
            ],
        });
        generated
    } else {
        config_arg
    };

    for stage in [Stage::Clone, Stage::Override, Stage::Pull] {
        invocations.push(StageInvocation {
            stage,
            args: vec![stage.name().to_string(), stage_config.clone()],
        });
    }

    invocations
}

pub struct Pipeline {
    runner: Arc<dyn ProcessRunner>,
    executable: PathBuf,
}

impl Pipeline {
    pub fn new(runner: Arc<dyn ProcessRunner>, executable: PathBuf) -> Self {
        Self { runner, executable }
    }

    async fn run_invocation(&self, invocation: &StageInvocation) -> StageResult {
        info!("Running {} stage", invocation.stage);

        let command = ProcessCommand::new(self.executable.display().to_string())
            .args(invocation.args.iter().cloned())
            .env(CHILD_STAGE_ENV, invocation.stage.name())
            .inherit_output();

        let started = Instant::now();
        let success = match self.runner.run(command).await {
            Ok(output) if output.success() => true,
            Ok(output) => {
                error!(
                    "{} stage failed with exit code {:?}",
                    invocation.stage, output.code
                );
                false
            }
            Err(e) => {
                error!("Failed to start {} stage: {e}", invocation.stage);
                false
            }
        };

        StageResult {
            stage: invocation.stage,
            success,
            duration: started.elapsed(),
        }
    }

    /// Runs the planned stages in order and returns the results of every
    /// stage that was started.
    pub async fn run(&self, config_path: &Path, discover: bool) -> Vec<StageResult> {
        let mut results = Vec::new();

        for invocation in plan(config_path, discover) {
            let result = self.run_invocation(&invocation).await;
            let success = result.success;
            results.push(result);

            if !success {
                error!("Pipeline stopped: {} stage failed", invocation.stage);
                break;
            }
        }

        results
    }
}

/// Entry point of `tfcollect run`.
pub async fn run(config_path: &Path, discover: bool, runner: Arc<dyn ProcessRunner>) -> Result<bool> {
    info!("Starting Terraform collection pipeline");

    let executable = std::env::current_exe().context("Failed to locate the tfcollect executable")?;
    let results = Pipeline::new(runner, executable).run(config_path, discover).await;
    output::print_pipeline_summary(&results);

    let success = results.iter().all(|r| r.success);
    if success {
        info!("Pipeline completed successfully");
    }
    Ok(success)
}
