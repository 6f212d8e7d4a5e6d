use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::run_checked;
use crate::error::Result;
use crate::process::{ProcessCommand, ProcessOutput, ProcessRunner};

/// Terraform CLI operations used by the pull stage.
pub struct TerraformClient {
    runner: Arc<dyn ProcessRunner>,
    program: String,
    timeout: Duration,
}

impl TerraformClient {
    pub fn new(runner: Arc<dyn ProcessRunner>, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout,
        }
    }

    fn command(&self, dir: &Path) -> ProcessCommand {
        ProcessCommand::new(&self.program)
            .current_dir(dir)
            .timeout(self.timeout)
    }

    /// `terraform init` with backend integration disabled.
    pub async fn init(&self, dir: &Path) -> Result<()> {
        let command = self
            .command(dir)
            .args(["init", "-backend=false", "-input=false", "-no-color"]);
        run_checked(self.runner.as_ref(), command).await?;
        Ok(())
    }

    /// `terraform state pull`. The exit status is not checked: the output is
    /// returned as-is, since a repository without remote state exits non-zero.
    pub async fn state_pull(&self, dir: &Path) -> Result<ProcessOutput> {
        let command = self.command(dir).args(["state", "pull"]);
        Ok(self.runner.run(command).await?)
    }
}
