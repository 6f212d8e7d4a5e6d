use log::debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::run_checked;
use crate::error::Result;
use crate::process::{ProcessCommand, ProcessOutput, ProcessRunner};

/// Sparse-checkout patterns: Terraform files at the root and at any depth.
pub const SPARSE_PATTERNS: [&str; 2] = ["*.tf", "**/*.tf"];

/// Shallow, blob-filtered git operations used by the clone stage.
pub struct GitClient {
    runner: Arc<dyn ProcessRunner>,
    program: String,
    timeout: Duration,
}

impl GitClient {
    pub fn new(runner: Arc<dyn ProcessRunner>, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout,
        }
    }

    fn command(&self, dir: Option<&Path>) -> ProcessCommand {
        let command = ProcessCommand::new(&self.program).timeout(self.timeout);
        match dir {
            Some(dir) => command.current_dir(dir),
            None => command,
        }
    }

    async fn git(&self, dir: &Path, args: &[&str]) -> Result<ProcessOutput> {
        run_checked(self.runner.as_ref(), self.command(Some(dir)).args(args.iter().copied())).await
    }

    /// `git clone --depth 1 --filter=blob:none --no-checkout <url> <dest>`
    pub async fn clone_shallow(&self, url: &str, dest: &Path) -> Result<()> {
        let command = self
            .command(None)
            .args(["clone", "--depth", "1", "--filter=blob:none", "--no-checkout"])
            .arg(url)
            .arg(dest.to_string_lossy());

        run_checked(self.runner.as_ref(), command).await?;
        Ok(())
    }

    pub async fn fetch_shallow(&self, dir: &Path) -> Result<()> {
        self.git(dir, &["fetch", "--depth", "1", "--filter=blob:none", "origin"])
            .await?;
        Ok(())
    }

    /// Name of the remote's default branch, falling back to the current branch.
    pub async fn default_branch(&self, dir: &Path) -> Result<String> {
        if let Ok(output) = self
            .git(dir, &["symbolic-ref", "--short", "refs/remotes/origin/HEAD"])
            .await
        {
            let remote_head = output.stdout.trim();
            if let Some(branch) = remote_head.strip_prefix("origin/") {
                return Ok(branch.to_string());
            }
        }

        let output = self.git(dir, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Points the local branch at the fetched remote-tracking ref, checks it
    /// out and discards local modifications.
    pub async fn fast_forward(&self, dir: &Path, branch: &str) -> Result<()> {
        let local = format!("refs/heads/{branch}");
        let remote = format!("refs/remotes/origin/{branch}");

        self.git(dir, &["update-ref", &local, &remote]).await?;
        self.git(dir, &["checkout", branch]).await?;
        self.git(dir, &["reset", "--hard", &remote]).await?;
        Ok(())
    }

    /// Restricts the checkout to Terraform files (non-cone mode).
    pub async fn configure_sparse_checkout(&self, dir: &Path) -> Result<()> {
        let mut args = vec!["sparse-checkout", "set", "--no-cone"];
        args.extend(SPARSE_PATTERNS);
        self.git(dir, &args).await?;
        debug!("Sparse checkout configured for {}", dir.display());
        Ok(())
    }

    /// Populates index and working tree from HEAD, honouring sparse patterns.
    pub async fn materialize(&self, dir: &Path) -> Result<()> {
        self.git(dir, &["read-tree", "-m", "-u", "HEAD"]).await?;
        Ok(())
    }
}
