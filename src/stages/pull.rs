use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;

use crate::batch::{run_stage, Outcome, StageProcessor};
use crate::config::Config;
use crate::error::CollectError;
use crate::process::ProcessRunner;
use crate::tools::{self, TerraformClient};
use crate::workspace::{self, WorkingCopy, STATE_FILE_NAME};

/// Initializes Terraform in every working copy and captures its current state.
pub struct PullStage {
    terraform: TerraformClient,
}

impl PullStage {
    pub fn new(terraform: TerraformClient) -> Self {
        Self { terraform }
    }

    async fn pull_state(&self, copy: &WorkingCopy) -> crate::error::Result<()> {
        info!("Running terraform init in {}", copy.path.display());
        self.terraform.init(&copy.path).await?;

        info!("Running terraform state pull in {}", copy.path.display());
        let output = self.terraform.state_pull(&copy.path).await?;

        if !output.success() {
            debug!(
                "terraform state pull exited with {:?} in {copy}: {}",
                output.code,
                output.stderr.trim()
            );
        }

        if output.stdout.trim().is_empty() {
            info!("No state found in {copy}");
        }

        let state_file = copy.path.join(STATE_FILE_NAME);
        std::fs::write(&state_file, output.stdout.as_bytes())?;
        info!("State written to {}", state_file.display());

        Ok(())
    }
}

#[async_trait]
impl StageProcessor for PullStage {
    type Item = WorkingCopy;

    fn name(&self) -> &'static str {
        "Pull"
    }

    async fn process(&self, copy: &WorkingCopy) -> Outcome {
        if !copy.path.is_dir() {
            let err = CollectError::MissingWorkingCopy(copy.path.display().to_string());
            return Outcome::Failed(err.to_string());
        }

        if !workspace::has_terraform_files(&copy.path) {
            return Outcome::Skipped("no Terraform files found".to_string());
        }

        info!("Processing repository: {copy}");

        match self.pull_state(copy).await {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::Failed(format!("Failed to pull state for {copy}: {e}")),
        }
    }
}

/// Entry point of `tfcollect pull`.
pub async fn run(config_path: &Path, runner: Arc<dyn ProcessRunner>) -> Result<bool> {
    info!("Starting Terraform file collection - Pull stage");
    info!("Platform: {}", std::env::consts::OS);

    let config = Config::load(config_path)?;
    let tools = &config.tools;

    let required = [tools.terraform.as_str(), tools.git.as_str()];
    if !tools::check_prerequisites(runner.as_ref(), &required, tools.version_timeout()).await {
        return Ok(false);
    }

    let repos_dir = super::existing_repos_dir(&config)?;
    let copies = workspace::list_working_copies(&repos_dir)?;

    if copies.is_empty() {
        warn!("No repository directories found in {}", repos_dir.display());
        info!("Pull stage completed with no repositories to process");
        return Ok(true);
    }

    info!("Found {} repositories to process", copies.len());

    let terraform = TerraformClient::new(runner, &tools.terraform, tools.command_timeout());
    let report = run_stage(&PullStage::new(terraform), copies).await;

    Ok(super::finish(&report))
}
