use async_trait::async_trait;
use octocrab::Octocrab;
use secrecy::ExposeSecret;

use crate::credentials::ActorCredentials;
use crate::error::{ReleaseError, Result};
use crate::retry::{with_retry, RetryConfig};

/// Owner/name pair identifying the repository being released
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl Repository {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn https_url(&self, host: &str) -> String {
        format!("https://{}/{}/{}", host, self.owner, self.name)
    }
}

/// Head/base pair of a pull request within a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub repository: Repository,
    pub head: String,
    pub base: String,
}

impl PullRequestRef {
    /// Search query matching open pull requests for this head and base
    pub fn open_search_query(&self) -> String {
        format!(
            "repo:{} state:open head:{} base:{}",
            self.repository.slug(),
            self.head,
            self.base
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub target: PullRequestRef,
    pub title: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPullRequest {
    pub number: u64,
    pub url: Option<String>,
}

/// The pull-request operations the release flow needs from a hosting platform
#[async_trait]
pub trait PullRequestHost: Send + Sync {
    /// Number of open pull requests from `target.head` into `target.base`
    async fn count_open_pull_requests(&self, target: &PullRequestRef) -> Result<usize>;

    async fn create_pull_request(&self, request: &NewPullRequest) -> Result<CreatedPullRequest>;
}

pub struct GitHubClient {
    octocrab: Octocrab,
    retry_config: RetryConfig,
}

impl GitHubClient {
    /// Build a client authenticating as the actor with basic auth
    pub fn new(credentials: &ActorCredentials) -> Result<Self> {
        let octocrab = Octocrab::builder()
            .basic_auth(
                credentials.username.clone(),
                credentials.token.expose_secret().to_string(),
            )
            .build()?;

        Ok(Self {
            octocrab,
            retry_config: RetryConfig::default(),
        })
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }
}

#[async_trait]
impl PullRequestHost for GitHubClient {
    async fn count_open_pull_requests(&self, target: &PullRequestRef) -> Result<usize> {
        let query = target.open_search_query();
        tracing::info!("Searching for pull requests: {}", query);

        let operation_name = format!("Searching pull requests in {}", target.repository.slug());
        let octocrab = self.octocrab.clone();

        let page = with_retry(&operation_name, &self.retry_config, || {
            let octocrab = octocrab.clone();
            let query = query.clone();

            async move {
                let page = octocrab
                    .search()
                    .issues_and_pull_requests(&query)
                    .send()
                    .await?;
                Ok::<_, ReleaseError>(page)
            }
        })
        .await?;

        match serde_json::to_string_pretty(&page.items) {
            Ok(json) => tracing::debug!("Search result: {}", json),
            Err(e) => tracing::debug!("Search result not serializable: {}", e),
        }

        Ok(page.items.len())
    }

    async fn create_pull_request(&self, request: &NewPullRequest) -> Result<CreatedPullRequest> {
        let target = &request.target;
        tracing::info!(
            "Creating pull request {} -> {} in {}",
            target.head,
            target.base,
            target.repository.slug()
        );

        let pulls = self
            .octocrab
            .pulls(&target.repository.owner, &target.repository.name);
        let mut builder = pulls.create(&request.title, &target.head, &target.base);
        if let Some(body) = &request.body {
            builder = builder.body(body);
        }
        let pull = builder.send().await?;

        Ok(CreatedPullRequest {
            number: pull.number,
            url: pull.html_url.map(|url| url.to_string()),
        })
    }
}
