use serde::Deserialize;

/// A repository entry as returned by both Bitbucket listing APIs.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryEntry {
    pub name: String,
    #[serde(default)]
    pub links: RepositoryLinks,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoryLinks {
    #[serde(default)]
    pub clone: Vec<CloneLink>,
}

/// Named clone endpoint (e.g., `ssh`, `http`, `https`)
#[derive(Debug, Clone, Deserialize)]
pub struct CloneLink {
    pub name: String,
    pub href: String,
}

/// Bitbucket Server page: offset/limit pagination
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPage {
    #[serde(default)]
    pub values: Vec<RepositoryEntry>,
    #[serde(default = "default_last_page")]
    pub is_last_page: bool,
    pub next_page_start: Option<u64>,
}

/// Bitbucket Cloud page: page-number pagination with a `next` link
#[derive(Debug, Deserialize)]
pub struct CloudPage {
    #[serde(default)]
    pub values: Vec<RepositoryEntry>,
    pub next: Option<String>,
}

fn default_last_page() -> bool {
    true
}

impl RepositoryEntry {
    pub fn ssh_url(&self) -> Option<&str> {
        self.links
            .clone
            .iter()
            .find(|link| link.name == "ssh")
            .map(|link| link.href.as_str())
    }
}
