use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const GENERATED_CONFIG_NAME: &str = "repos.yaml";

/// Configuration file structure for the collection pipeline.
///
/// The same document is read by every stage; each stage only looks at the
/// sections it needs. Relative paths inside it are resolved against the
/// directory containing the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// SSH clone URLs consumed by the clone stage
    pub repositories: Option<Vec<String>>,

    /// Delay in seconds between clone attempts
    #[serde(default = "default_rate_limit")]
    pub rate_limit: f64,

    /// Directories whose top-level `.tf` files are copied into every working copy
    pub override_sources: Option<Vec<PathBuf>>,

    /// Base directory holding one working copy per repository
    #[serde(default = "default_repos_dir")]
    pub repos_dir: PathBuf,

    /// External tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Repository directory services used by discovery
    pub bitbucket: Option<BitbucketConfig>,

    /// Directory the file was loaded from
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_git")]
    pub git: String,

    #[serde(default = "default_terraform")]
    pub terraform: String,

    /// Timeout applied to every git/terraform invocation
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Timeout for the `--version` availability probe
    #[serde(default = "default_version_timeout")]
    pub version_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BitbucketConfig {
    pub server: Option<BitbucketServerConfig>,
    pub cloud: Option<BitbucketCloudConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitbucketServerConfig {
    /// Bitbucket Server base URL (e.g., <https://bitbucket.example.com>)
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub projects: Vec<ScopeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitbucketCloudConfig {
    #[serde(default = "default_cloud_api_url")]
    pub api_url: String,
    pub username: Option<String>,
    pub app_password: Option<String>,
    #[serde(default)]
    pub workspaces: Vec<ScopeConfig>,
}

/// A project (server) or workspace (cloud) to list, with an optional name filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    pub name: String,
    pub repo_pattern: Option<String>,
}

/// The artifact written by discovery and read by later stages.
///
/// Besides the discovered repositories it carries every setting of the
/// source config except `bitbucket`, with paths made absolute so they keep
/// pointing at the same place wherever the artifact is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedConfig {
    pub repositories: Vec<String>,
    pub rate_limit: f64,
    pub override_sources: Vec<PathBuf>,
    pub repos_dir: PathBuf,
    pub tools: ToolsConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            git: default_git(),
            terraform: default_terraform(),
            command_timeout_secs: default_command_timeout(),
            version_timeout_secs: default_version_timeout(),
        }
    }
}

fn default_rate_limit() -> f64 {
    0.1
}

fn default_repos_dir() -> PathBuf {
    PathBuf::from("repos")
}

fn default_git() -> String {
    "git".to_string()
}

fn default_terraform() -> String {
    "terraform".to_string()
}

fn default_command_timeout() -> u64 {
    300
}

fn default_version_timeout() -> u64 {
    10
}

fn default_cloud_api_url() -> String {
    "https://api.bitbucket.org/2.0".to_string()
}

fn default_override_sources() -> Vec<PathBuf> {
    vec![
        PathBuf::from("./aws_deployment_overrides"),
        PathBuf::from("./k8s/deployment/overrides"),
    ]
}

impl ToolsConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn version_timeout(&self) -> Duration {
        Duration::from_secs(self.version_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// The extension picks the format (`yaml`/`yml`, `json`, `toml`); anything
    /// else is tried as YAML, then JSON, then TOML. A missing file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Configuration file {} not found", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let mut config: Self = match extension {
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            _ => serde_yaml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| toml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        config.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        Ok(config)
    }

    /// Resolves a possibly relative path against the config file's directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.resolve_path(&self.repos_dir)
    }

    /// Override source directories in configured order, resolved to absolute paths.
    pub fn override_sources(&self) -> Vec<PathBuf> {
        self.override_sources
            .clone()
            .unwrap_or_else(default_override_sources)
            .iter()
            .map(|source| {
                let resolved = self.resolve_path(source);
                std::path::absolute(&resolved).unwrap_or(resolved)
            })
            .collect()
    }

    /// Path of the discovery artifact next to this config file.
    pub fn generated_config_path(&self) -> PathBuf {
        self.base_dir.join(GENERATED_CONFIG_NAME)
    }
}

impl GeneratedConfig {
    pub fn from_config(config: &Config, repositories: Vec<String>) -> Self {
        let repos_dir = config.repos_dir();

        Self {
            repositories,
            rate_limit: config.rate_limit,
            override_sources: config.override_sources(),
            repos_dir: std::path::absolute(&repos_dir).unwrap_or(repos_dir),
            tools: config.tools.clone(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_yaml::to_string(self)?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write generated config: {}", path.display()))?;

        Ok(())
    }
}
