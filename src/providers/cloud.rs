use async_trait::async_trait;
use log::info;
use reqwest::Client;
use url::Url;

use super::types::CloudPage;
use super::{check_status, collect_ssh_urls, http_client, NamePattern, RepositoryDirectory, PAGE_SIZE};
use crate::auth::Credentials;
use crate::error::{CollectError, Result};

/// Client for the Bitbucket Cloud 2.0 API.
pub struct BitbucketCloudClient {
    client: Client,
    api_url: Url,
    credentials: Credentials,
}

impl BitbucketCloudClient {
    /// Creates a client against `api_url` (normally <https://api.bitbucket.org/2.0>).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(api_url: &str, credentials: Credentials) -> Result<Self> {
        let api_url = Url::parse(&format!("{}/", api_url.trim_end_matches('/')))
            .map_err(|e| CollectError::Config(format!("Invalid Bitbucket Cloud API URL: {e}")))?;

        Ok(Self {
            client: http_client()?,
            api_url,
            credentials,
        })
    }

    fn repos_url(&self, workspace: &str) -> Result<Url> {
        self.api_url
            .join(&format!("repositories/{workspace}"))
            .map_err(|e| CollectError::Config(format!("Invalid workspace URL: {e}")))
    }

    async fn fetch_page(&self, url: &Url, page: u64) -> Result<CloudPage> {
        let response = self
            .client
            .get(url.clone())
            .basic_auth(self.credentials.username(), Some(self.credentials.secret()))
            .query(&[("page", page), ("pagelen", PAGE_SIZE)])
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }
}

#[async_trait]
impl RepositoryDirectory for BitbucketCloudClient {
    fn scope_kind(&self) -> &'static str {
        "workspace"
    }

    async fn list_ssh_urls(&self, workspace: &str, pattern: Option<&NamePattern>) -> Result<Vec<String>> {
        info!("Fetching repositories from workspace: {workspace}");

        let url = self.repos_url(workspace)?;
        let mut urls = Vec::new();
        let mut page = 1;

        loop {
            let body = self.fetch_page(&url, page).await?;
            collect_ssh_urls(&body.values, pattern, &mut urls);

            if body.next.is_none() {
                break;
            }

            page += 1;
        }

        Ok(urls)
    }
}
