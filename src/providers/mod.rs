//! Repository directory services used by discovery.

mod cloud;
mod server;
mod types;

pub use cloud::BitbucketCloudClient;
pub use server::BitbucketServerClient;

use async_trait::async_trait;
use log::{debug, warn};
use regex::Regex;
use reqwest::{Client, Response};

use crate::error::{CollectError, Result};
use types::RepositoryEntry;

pub(crate) const PAGE_SIZE: u64 = 100;
const USER_AGENT: &str = concat!("tfcollect/", env!("CARGO_PKG_VERSION"));

/// Lists SSH clone URLs of repositories within a named scope (a Bitbucket
/// Server project or a Bitbucket Cloud workspace).
#[async_trait]
pub trait RepositoryDirectory: Send + Sync {
    /// Human-readable scope kind, e.g. "project" or "workspace"
    fn scope_kind(&self) -> &'static str;

    async fn list_ssh_urls(&self, scope: &str, pattern: Option<&NamePattern>) -> Result<Vec<String>>;
}

/// Repository name filter, anchored at the start of the name.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Regex,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})")).map_err(|source| {
            CollectError::Pattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| CollectError::Config(format!("Failed to create HTTP client: {e}")))
}

/// Turns non-2xx responses into [`CollectError::Api`].
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    Err(CollectError::Api {
        url,
        status: status.as_u16(),
        message,
    })
}

/// Appends the SSH clone URL of every entry matching `pattern`.
///
/// Entries without an SSH link are logged and dropped.
pub(crate) fn collect_ssh_urls(
    entries: &[RepositoryEntry],
    pattern: Option<&NamePattern>,
    urls: &mut Vec<String>,
) {
    for entry in entries {
        if let Some(pattern) = pattern {
            if !pattern.matches(&entry.name) {
                debug!(
                    "Skipping {} - doesn't match pattern {}",
                    entry.name,
                    pattern.as_str()
                );
                continue;
            }
        }

        match entry.ssh_url() {
            Some(url) => {
                debug!("Added repository: {url}");
                urls.push(url.to_string());
            }
            None => warn!("No SSH clone URL found for {}", entry.name),
        }
    }
}
