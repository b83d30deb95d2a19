use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ReleaseError;
use crate::retry::RetryConfig;

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub branches: BranchConfig,

    #[serde(default)]
    pub changesets: ChangesetConfig,

    #[serde(default)]
    pub commands: CommandConfig,

    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub pull_request: PullRequestConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub credentials: CredentialConfig,

    #[serde(default)]
    pub retry: RetrySettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BranchConfig {
    #[serde(default = "default_main_branch")]
    pub main: String,

    #[serde(default = "default_release_branch")]
    pub release: String,

    /// Remote the CI checkout was cloned from
    #[serde(default = "default_upstream_remote")]
    pub upstream_remote: String,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            main: default_main_branch(),
            release: default_release_branch(),
            upstream_remote: default_upstream_remote(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChangesetConfig {
    #[serde(default = "default_changeset_dir")]
    pub dir: String,

    /// Entries of the changeset directory that are not changesets
    #[serde(default = "default_ignored_entries")]
    pub ignore: Vec<String>,
}

impl Default for ChangesetConfig {
    fn default() -> Self {
        Self {
            dir: default_changeset_dir(),
            ignore: default_ignored_entries(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CommandConfig {
    #[serde(default = "default_release_command")]
    pub release: Vec<String>,

    #[serde(default = "default_bump_command")]
    pub bump: Vec<String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            release: default_release_command(),
            bump: default_bump_command(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitConfig {
    #[serde(default = "default_git_host")]
    pub host: String,

    #[serde(default = "default_remote_name")]
    pub remote_name: String,

    #[serde(default = "default_bump_message")]
    pub commit_message: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            host: default_git_host(),
            remote_name: default_remote_name(),
            commit_message: default_bump_message(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PullRequestConfig {
    #[serde(default = "default_bump_message")]
    pub title: String,

    pub body: Option<String>,
}

impl Default for PullRequestConfig {
    fn default() -> Self {
        Self {
            title: default_bump_message(),
            body: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_host")]
    pub host: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host: default_registry_host(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct CredentialConfig {
    /// Leave `.netrc` and `.npmrc` behind for the CI teardown to remove
    #[serde(default)]
    pub keep: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    #[serde(default = "default_max_elapsed_ms")]
    pub max_elapsed_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            max_elapsed_ms: default_max_elapsed_ms(),
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_interval: Duration::from_millis(self.initial_interval_ms),
            max_interval: Duration::from_millis(self.max_interval_ms),
            max_elapsed_time: Some(Duration::from_millis(self.max_elapsed_ms)),
        }
    }
}

fn default_main_branch() -> String {
    "master".to_string()
}

fn default_release_branch() -> String {
    "changeset-release".to_string()
}

fn default_upstream_remote() -> String {
    "origin".to_string()
}

fn default_changeset_dir() -> String {
    ".changeset".to_string()
}

fn default_ignored_entries() -> Vec<String> {
    vec!["config.js".to_string(), "README.md".to_string()]
}

fn default_release_command() -> Vec<String> {
    vec!["yarn".to_string(), "release".to_string()]
}

fn default_bump_command() -> Vec<String> {
    vec![
        "yarn".to_string(),
        "changeset".to_string(),
        "bump".to_string(),
    ]
}

fn default_git_host() -> String {
    "github.com".to_string()
}

fn default_remote_name() -> String {
    "gh-https".to_string()
}

fn default_bump_message() -> String {
    "Bump Packages".to_string()
}

fn default_registry_host() -> String {
    "registry.npmjs.org".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_interval_ms() -> u64 {
    1_000
}

fn default_max_interval_ms() -> u64 {
    30_000
}

fn default_max_elapsed_ms() -> u64 {
    60_000
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the project file, falling back to the user-wide file and then defaults
    pub fn discover(project_path: &Path) -> Result<Self> {
        if project_path.exists() {
            return Self::load(project_path);
        }

        Self::load(&Self::default_path())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("changeset-release.toml"))
            .unwrap_or_else(|| PathBuf::from("~/.config/changeset-release.toml"))
    }

    pub fn validate(&self) -> std::result::Result<(), ReleaseError> {
        if self.commands.release.is_empty() {
            return Err(ReleaseError::Config(
                "commands.release must name a program".to_string(),
            ));
        }
        if self.commands.bump.is_empty() {
            return Err(ReleaseError::Config(
                "commands.bump must name a program".to_string(),
            ));
        }
        if self.branches.main == self.branches.release {
            return Err(ReleaseError::Config(format!(
                "release branch must differ from main branch '{}'",
                self.branches.main
            )));
        }
        Ok(())
    }

    /// Merge configuration with command line arguments
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(main) = &args.main_branch {
            self.branches.main = main.clone();
        }

        if let Some(release) = &args.release_branch {
            self.branches.release = release.clone();
        }
    }
}
