use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;
use url::Url;

use super::types::ServerPage;
use super::{check_status, collect_ssh_urls, http_client, NamePattern, RepositoryDirectory, PAGE_SIZE};
use crate::auth::Credentials;
use crate::error::{CollectError, Result};

/// Client for the Bitbucket Server (Data Center) REST API.
pub struct BitbucketServerClient {
    client: Client,
    api_url: Url,
    credentials: Credentials,
}

impl BitbucketServerClient {
    /// Creates a client for the instance at `base_url`
    /// (e.g., <https://bitbucket.example.com>).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self> {
        let api_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| CollectError::Config(format!("Invalid Bitbucket Server URL: {e}")))?
            .join("rest/api/1.0/")
            .map_err(|e| CollectError::Config(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client: http_client()?,
            api_url,
            credentials,
        })
    }

    fn repos_url(&self, project_key: &str) -> Result<Url> {
        self.api_url
            .join(&format!("projects/{project_key}/repos"))
            .map_err(|e| CollectError::Config(format!("Invalid project URL: {e}")))
    }

    async fn fetch_page(&self, url: &Url, start: u64) -> Result<ServerPage> {
        let response = self
            .client
            .get(url.clone())
            .basic_auth(self.credentials.username(), Some(self.credentials.secret()))
            .query(&[("start", start), ("limit", PAGE_SIZE)])
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }
}

#[async_trait]
impl RepositoryDirectory for BitbucketServerClient {
    fn scope_kind(&self) -> &'static str {
        "project"
    }

    async fn list_ssh_urls(&self, project_key: &str, pattern: Option<&NamePattern>) -> Result<Vec<String>> {
        info!("Fetching repositories from project: {project_key}");

        let url = self.repos_url(project_key)?;
        let mut urls = Vec::new();
        let mut start = 0;

        loop {
            let page = self.fetch_page(&url, start).await?;
            collect_ssh_urls(&page.values, pattern, &mut urls);

            if page.is_last_page {
                break;
            }

            match page.next_page_start {
                Some(next) => start = next,
                None => {
                    warn!("Project {project_key}: page is not the last one but has no nextPageStart, stopping");
                    break;
                }
            }
        }

        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn repo_json(name: &str) -> String {
        format!(
            r#"{{"name": "{name}", "links": {{"clone": [
                {{"name": "http", "href": "https://bb.example.com/scm/inf/{name}.git"}},
                {{"name": "ssh", "href": "git@bb.example.com:inf/{name}.git"}}
            ]}}}}"#
        )
    }

    fn page_query(start: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("start".into(), start.into()),
            Matcher::UrlEncoded("limit".into(), "100".into()),
        ])
    }

    #[tokio::test]
    async fn test_pages_until_last_page() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/rest/api/1.0/projects/INF/repos")
            .match_query(page_query("0"))
            .match_header("authorization", Matcher::Regex("^Basic ".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"values": [{}, {}], "isLastPage": false, "nextPageStart": 2}}"#,
                repo_json("terraform-a"),
                repo_json("app")
            ))
            .create_async()
            .await;
        let second = server
            .mock("GET", "/rest/api/1.0/projects/INF/repos")
            .match_query(page_query("2"))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"values": [{}], "isLastPage": true}}"#,
                repo_json("terraform-b")
            ))
            .create_async()
            .await;

        let client = BitbucketServerClient::new(&server.url(), Credentials::new("ci", "pw")).unwrap();
        let pattern = NamePattern::new("terraform-").unwrap();
        let urls = client.list_ssh_urls("INF", Some(&pattern)).await.unwrap();

        assert_eq!(
            urls,
            vec![
                "git@bb.example.com:inf/terraform-a.git",
                "git@bb.example.com:inf/terraform-b.git",
            ]
        );
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/api/1.0/projects/MISSING/repos")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"errors": [{"message": "Project MISSING does not exist."}]}"#)
            .create_async()
            .await;

        let client = BitbucketServerClient::new(&server.url(), Credentials::new("ci", "pw")).unwrap();
        let err = client.list_ssh_urls("MISSING", None).await.unwrap_err();

        match err {
            CollectError::Api { status, message, .. } => {
                assert_eq!(status, 404);
                assert!(message.contains("does not exist"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_base_url() {
        let result = BitbucketServerClient::new("not a url", Credentials::new("ci", "pw"));
        assert!(matches!(result, Err(CollectError::Config(_))));
    }
}
