use anyhow::{Context, Result};
use async_trait::async_trait;
use indexmap::IndexSet;
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::auth::Credentials;
use crate::batch::{run_stage, Outcome, StageProcessor, StageReport};
use crate::config::{BitbucketConfig, Config, GeneratedConfig};
use crate::providers::{BitbucketCloudClient, BitbucketServerClient, NamePattern, RepositoryDirectory};

pub const SERVER_USERNAME_ENV: &str = "BITBUCKET_SERVER_USERNAME";
pub const SERVER_PASSWORD_ENV: &str = "BITBUCKET_SERVER_PASSWORD";
pub const CLOUD_USERNAME_ENV: &str = "BITBUCKET_CLOUD_USERNAME";
pub const CLOUD_APP_PASSWORD_ENV: &str = "BITBUCKET_CLOUD_APP_PASSWORD";

/// One project or workspace to list, bound to the directory service that owns it.
#[derive(Clone)]
pub struct DiscoveryScope {
    /// Position in the configured scope list; the same project may appear
    /// more than once with different patterns
    position: usize,
    directory: Arc<dyn RepositoryDirectory>,
    name: String,
    repo_pattern: Option<String>,
}

impl fmt::Display for DiscoveryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.directory.scope_kind(), self.name)
    }
}

/// Result of a discovery run: the batch report and the combined,
/// deduplicated URL list in configured scope order.
pub struct Discovery {
    pub report: StageReport<DiscoveryScope>,
    pub repositories: Vec<String>,
}

#[derive(Default)]
pub struct DiscoverStage {
    found: Mutex<BTreeMap<usize, Vec<String>>>,
}

impl DiscoverStage {
    async fn list(&self, scope: &DiscoveryScope) -> crate::error::Result<Vec<String>> {
        let pattern = scope.repo_pattern.as_deref().map(NamePattern::new).transpose()?;
        scope.directory.list_ssh_urls(&scope.name, pattern.as_ref()).await
    }

    /// URLs of every scope that succeeded, in configured scope order, deduplicated.
    fn into_repositories(self) -> Vec<String> {
        let found = self.found.into_inner().unwrap_or_else(PoisonError::into_inner);

        let unique: IndexSet<String> = found.into_values().flatten().collect();

        unique.into_iter().collect()
    }
}

#[async_trait]
impl StageProcessor for DiscoverStage {
    type Item = DiscoveryScope;

    fn name(&self) -> &'static str {
        "Discovery"
    }

    async fn process(&self, scope: &DiscoveryScope) -> Outcome {
        match self.list(scope).await {
            Ok(urls) => {
                info!("Found {} repositories in {scope}", urls.len());
                self.found
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(scope.position, urls);
                Outcome::Success
            }
            Err(e) => Outcome::Failed(format!("Error fetching repositories from {scope}: {e}")),
        }
    }
}

/// Builds the work items for every configured target.
///
/// A target whose credentials cannot be resolved is logged and contributes
/// no scopes; the remaining targets are still processed.
pub fn build_scopes(bitbucket: &BitbucketConfig) -> crate::error::Result<Vec<DiscoveryScope>> {
    let mut scopes = Vec::new();

    if let Some(server) = &bitbucket.server {
        info!("Processing Bitbucket Server repositories");
        match Credentials::resolve(
            server.username.as_deref(),
            SERVER_USERNAME_ENV,
            server.password.as_deref(),
            SERVER_PASSWORD_ENV,
        ) {
            Some(credentials) => {
                let directory: Arc<dyn RepositoryDirectory> =
                    Arc::new(BitbucketServerClient::new(&server.url, credentials)?);
                scopes.extend(server.projects.iter().map(|project| DiscoveryScope {
                    position: 0,
                    directory: Arc::clone(&directory),
                    name: project.name.clone(),
                    repo_pattern: project.repo_pattern.clone(),
                }));
            }
            None => error!(
                "Bitbucket Server credentials not found in config or {SERVER_USERNAME_ENV}/{SERVER_PASSWORD_ENV} env vars"
            ),
        }
    }

    if let Some(cloud) = &bitbucket.cloud {
        info!("Processing Bitbucket Cloud repositories");
        match Credentials::resolve(
            cloud.username.as_deref(),
            CLOUD_USERNAME_ENV,
            cloud.app_password.as_deref(),
            CLOUD_APP_PASSWORD_ENV,
        ) {
            Some(credentials) => {
                let directory: Arc<dyn RepositoryDirectory> =
                    Arc::new(BitbucketCloudClient::new(&cloud.api_url, credentials)?);
                scopes.extend(cloud.workspaces.iter().map(|workspace| DiscoveryScope {
                    position: 0,
                    directory: Arc::clone(&directory),
                    name: workspace.name.clone(),
                    repo_pattern: workspace.repo_pattern.clone(),
                }));
            }
            None => error!(
                "Bitbucket Cloud credentials not found in config or {CLOUD_USERNAME_ENV}/{CLOUD_APP_PASSWORD_ENV} env vars"
            ),
        }
    }

    for (position, scope) in scopes.iter_mut().enumerate() {
        scope.position = position;
    }

    Ok(scopes)
}

/// Lists every configured scope and combines the results.
pub async fn discover(bitbucket: &BitbucketConfig) -> crate::error::Result<Discovery> {
    let scopes = build_scopes(bitbucket)?;

    let stage = DiscoverStage::default();
    let report = run_stage(&stage, scopes).await;
    let repositories = stage.into_repositories();

    Ok(Discovery {
        report,
        repositories,
    })
}

/// Entry point of `tfcollect discover`.
pub async fn run(config_path: &Path, output: Option<PathBuf>) -> Result<bool> {
    info!("Starting repository discovery");

    let config = Config::load(config_path)?;
    let bitbucket = config
        .bitbucket
        .as_ref()
        .context("No 'bitbucket' section found in config")?;

    let Discovery {
        report,
        repositories,
    } = discover(bitbucket).await?;
    let stage_ok = super::finish(&report);

    if repositories.is_empty() {
        warn!("No repositories found");
        return Ok(false);
    }

    info!("Discovered {} unique repositories", repositories.len());

    let output_path = output.unwrap_or_else(|| config.generated_config_path());
    let count = repositories.len();
    GeneratedConfig::from_config(&config, repositories).save(&output_path)?;
    info!("Successfully wrote {count} repositories to {}", output_path.display());

    if stage_ok {
        info!("Repository discovery completed successfully");
    }

    Ok(stage_ok)
}
