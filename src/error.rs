use thiserror::Error;

use crate::process::ProcessError;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("API request to {url} failed with status {status}: {message}")]
    Api {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unsupported repository URL: {0}. Only SSH URLs of the form user@host:org/repo[.git] are supported")]
    UnsupportedRepoUrl(String),

    #[error("Invalid repository pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Working copy does not exist: {0}")]
    MissingWorkingCopy(String),

    #[error("Command `{command}` failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

pub type Result<T> = std::result::Result<T, CollectError>;
