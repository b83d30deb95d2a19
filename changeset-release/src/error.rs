use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("GitHub API error: {0}")]
    GitHubApi(Box<octocrab::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Release was not successful: `{command}` exited with {status}")]
    ReleaseFailed { command: String, status: String },

    #[error("Changeset directory not found at {path}")]
    MissingChangesetDir { path: PathBuf },

    #[error("Could not read merge-base of {branch} and {base}")]
    MissingMergeBase { branch: String, base: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid repository '{input}'. Expected an owner and a repository name without '/'")]
    InvalidRepo { input: String },
}

pub type Result<T> = std::result::Result<T, ReleaseError>;

impl From<octocrab::Error> for ReleaseError {
    fn from(err: octocrab::Error) -> Self {
        ReleaseError::GitHubApi(Box::new(err))
    }
}
