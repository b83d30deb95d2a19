use clap::Parser;
use secrecy::SecretString;
use std::path::PathBuf;

use crate::credentials::ActorCredentials;
use crate::error::{ReleaseError, Result};
use crate::github::Repository;
use crate::releaser::ReleaseContext;

/// Every CI input can be given as a flag or through its environment variable
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "changeset-release",
    version,
    about = "Publish packages or maintain a version-bump pull request from pending changesets",
    long_about = None
)]
pub struct Args {
    /// Repository owner
    #[clap(long, env = "CIRCLE_PROJECT_USERNAME")]
    pub owner: String,

    /// Repository name
    #[clap(long, env = "CIRCLE_PROJECT_REPONAME")]
    pub repo: String,

    /// Branch this CI run was triggered on
    #[clap(long, env = "CIRCLE_BRANCH")]
    pub branch: String,

    /// User that commits, pushes and opens the pull request
    #[clap(long, env = "GITHUB_ACTOR")]
    pub actor: String,

    /// Token for the actor, used for HTTPS pushes and the GitHub API
    #[clap(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    /// Registry publish token
    #[clap(long, env = "NPM_TOKEN", hide_env_values = true)]
    pub npm_token: String,

    /// Directory receiving `.netrc` and `.npmrc`
    #[clap(long, env = "HOME")]
    pub home: PathBuf,

    /// Repository checkout to operate on (defaults to the current directory)
    #[clap(long)]
    pub cwd: Option<PathBuf>,

    /// Configuration file path
    #[clap(long, default_value = ".config/changeset-release.toml")]
    pub config: PathBuf,

    /// Override the main branch from the configuration
    #[clap(long)]
    pub main_branch: Option<String>,

    /// Override the release branch from the configuration
    #[clap(long)]
    pub release_branch: Option<String>,

    /// Enable verbose output
    #[clap(long)]
    pub verbose: bool,
}

impl Args {
    pub fn repository(&self) -> Result<Repository> {
        let valid = |part: &str| !part.trim().is_empty() && !part.contains('/');
        if !valid(&self.owner) || !valid(&self.repo) {
            return Err(ReleaseError::InvalidRepo {
                input: format!("{}/{}", self.owner, self.repo),
            });
        }
        Ok(Repository::new(self.owner.trim(), self.repo.trim()))
    }

    pub fn work_tree(&self) -> Result<PathBuf> {
        match &self.cwd {
            Some(cwd) => Ok(cwd.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Resolve the configuration path against the working tree
    pub fn config_path(&self) -> Result<PathBuf> {
        if self.config.is_absolute() {
            Ok(self.config.clone())
        } else {
            Ok(self.work_tree()?.join(&self.config))
        }
    }

    pub fn to_context(&self) -> Result<ReleaseContext> {
        Ok(ReleaseContext {
            repository: self.repository()?,
            current_branch: self.branch.clone(),
            actor: ActorCredentials::new(self.actor.clone(), self.github_token.clone()),
            registry_token: SecretString::from(self.npm_token.clone()),
            home: self.home.clone(),
            work_tree: self.work_tree()?,
        })
    }
}
