use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::batch::{run_stage, Outcome, StageProcessor, StageReport};
use crate::config::Config;
use crate::process::ProcessRunner;
use crate::tools::{self, GitClient};
use crate::workspace::RepoLocator;

/// Creates or refreshes sparse, shallow working copies holding only Terraform files.
pub struct CloneStage {
    git: GitClient,
    repos_dir: PathBuf,
    rate_limit: Option<Duration>,
}

impl CloneStage {
    /// `rate_limit` is in seconds; non-positive values disable the delay.
    pub fn new(git: GitClient, repos_dir: PathBuf, rate_limit: f64) -> Self {
        let rate_limit = (rate_limit > 0.0 && rate_limit.is_finite())
            .then(|| Duration::from_secs_f64(rate_limit));

        Self {
            git,
            repos_dir,
            rate_limit,
        }
    }

    async fn clone_or_update(&self, url: &str) -> crate::error::Result<()> {
        let locator = RepoLocator::parse(url)?;
        let repo_dir = locator.working_copy(&self.repos_dir);

        if repo_dir.join(".git").is_dir() {
            // An interrupted clone leaves `.git` with an unborn HEAD that can never be updated
            if let Err(e) = self.update(url, &repo_dir).await {
                warn!("Updating {url} failed, recloning: {e}");
                self.fresh_clone(url, &repo_dir).await?;
            }
        } else {
            self.fresh_clone(url, &repo_dir).await?;
        }

        info!("Successfully cloned {}/{}", locator.project, locator.repo);
        Ok(())
    }

    async fn update(&self, url: &str, repo_dir: &Path) -> crate::error::Result<()> {
        info!("Updating {url} in {}", repo_dir.display());

        self.git.fetch_shallow(repo_dir).await?;
        let branch = self.git.default_branch(repo_dir).await?;
        self.git.configure_sparse_checkout(repo_dir).await?;
        self.git.fast_forward(repo_dir, &branch).await
    }

    async fn fresh_clone(&self, url: &str, repo_dir: &Path) -> crate::error::Result<()> {
        // Leftover from an interrupted run
        if repo_dir.exists() {
            info!("Removing existing directory: {}", repo_dir.display());
            std::fs::remove_dir_all(repo_dir)?;
        }
        if let Some(parent) = repo_dir.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Cloning {url} to {}", repo_dir.display());

        self.git.clone_shallow(url, repo_dir).await?;
        self.git.configure_sparse_checkout(repo_dir).await?;
        self.git.materialize(repo_dir).await
    }
}

#[async_trait]
impl StageProcessor for CloneStage {
    type Item = String;

    fn name(&self) -> &'static str {
        "Clone"
    }

    async fn process(&self, url: &String) -> Outcome {
        let outcome = match self.clone_or_update(url).await {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::Failed(format!("Failed to clone {url}: {e}")),
        };

        if let Some(delay) = self.rate_limit {
            debug!("Rate limiting: waiting {} seconds", delay.as_secs_f64());
            tokio::time::sleep(delay).await;
        }

        outcome
    }
}

pub async fn clone_all(stage: &CloneStage, repositories: Vec<String>) -> StageReport<String> {
    info!("Found {} repositories to clone", repositories.len());
    run_stage(stage, repositories).await
}

/// Entry point of `tfcollect clone`.
pub async fn run(config_path: &Path, runner: Arc<dyn ProcessRunner>) -> Result<bool> {
    info!("Starting Terraform file collection - Clone stage");
    info!("Platform: {}", std::env::consts::OS);

    let config = Config::load(config_path)?;
    let repositories = config
        .repositories
        .clone()
        .context("No 'repositories' section found in config")?;

    let tools = &config.tools;
    if !tools::check_prerequisites(runner.as_ref(), &[tools.git.as_str()], tools.version_timeout()).await {
        return Ok(false);
    }

    let repos_dir = config.repos_dir();
    std::fs::create_dir_all(&repos_dir)
        .with_context(|| format!("Failed to create repos directory: {}", repos_dir.display()))?;

    let git = GitClient::new(runner, &tools.git, tools.command_timeout());
    let stage = CloneStage::new(git, repos_dir, config.rate_limit);
    let report = clone_all(&stage, repositories).await;

    Ok(super::finish(&report))
}
