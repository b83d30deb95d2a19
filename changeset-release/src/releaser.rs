use secrecy::SecretString;
use std::path::PathBuf;

use crate::changesets;
use crate::config::Config;
use crate::credentials::{self, ActorCredentials, CredentialFile};
use crate::error::{ReleaseError, Result};
use crate::git::{BranchState, Git};
use crate::github::{CreatedPullRequest, NewPullRequest, PullRequestHost, PullRequestRef, Repository};
use crate::process::{CommandRunner, Invocation};

/// Everything the CI environment tells us about this run
#[derive(Debug, Clone)]
pub struct ReleaseContext {
    pub repository: Repository,
    pub current_branch: String,
    pub actor: ActorCredentials,
    pub registry_token: SecretString,
    pub home: PathBuf,
    pub work_tree: PathBuf,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not on the main branch; nothing was touched
    Skipped { branch: String },
    /// No pending changesets; the release command ran and tags were pushed
    Published,
    /// The release branch is already up to date with main's changesets
    NoNewChangesets,
    PullRequestCreated(CreatedPullRequest),
    PullRequestExists,
}

/// Drives one CI run: either publishes directly or maintains the version-bump pull request
pub struct Releaser<'a, R: CommandRunner, H: PullRequestHost> {
    config: Config,
    context: ReleaseContext,
    runner: &'a R,
    host: &'a H,
}

impl<'a, R: CommandRunner, H: PullRequestHost> Releaser<'a, R, H> {
    pub fn new(config: Config, context: ReleaseContext, runner: &'a R, host: &'a H) -> Self {
        Self {
            config,
            context,
            runner,
            host,
        }
    }

    pub async fn run(&self) -> Result<Outcome> {
        let main = &self.config.branches.main;
        if &self.context.current_branch != main {
            tracing::info!(
                "Not on {}, on branch: {}",
                main,
                self.context.current_branch
            );
            return Ok(Outcome::Skipped {
                branch: self.context.current_branch.clone(),
            });
        }

        let git = Git::new(self.runner, &self.context.work_tree);
        let _netrc = self.setup(&git).await?;

        let changeset_dir = self.context.work_tree.join(&self.config.changesets.dir);
        if !changesets::has_changesets(&changeset_dir, &self.config.changesets.ignore)? {
            tracing::info!(
                "No changesets found, attempting to publish any unpublished packages"
            );
            return self.publish(&git).await;
        }

        self.accumulate(&git).await
    }

    /// Git identity, HTTPS remote and `.netrc`; the returned guard must outlive every push
    async fn setup(&self, git: &Git<'_, R>) -> Result<CredentialFile> {
        let actor = &self.context.actor;
        let host = &self.config.git.host;

        tracing::info!("Setting git user");
        git.configure_identity(&actor.username, &actor.noreply_email())
            .await?;
        git.unset_ssh_rewrite(host).await?;
        git.ensure_remote(
            &self.config.git.remote_name,
            &self.context.repository.https_url(host),
        )
        .await?;

        tracing::info!("Setting GitHub credentials");
        CredentialFile::write(
            self.context.home.join(".netrc"),
            &credentials::netrc_contents(host, actor),
            self.config.credentials.keep,
        )
    }

    async fn publish(&self, git: &Git<'_, R>) -> Result<Outcome> {
        let _npmrc = CredentialFile::write(
            self.context.home.join(".npmrc"),
            &credentials::npmrc_contents(&self.config.registry.host, &self.context.registry_token),
            self.config.credentials.keep,
        )?;

        let release = Invocation::from_command_line(&self.config.commands.release)?;
        tracing::info!("Running `{}`", release);
        let output = self.runner.run(&release, &self.context.work_tree).await?;
        if !output.success() {
            return Err(ReleaseError::ReleaseFailed {
                command: release.to_string(),
                status: output.status_text(),
            });
        }

        tracing::info!("Pushing tags");
        git.push_with_tags(&self.config.git.remote_name, &self.config.branches.main)
            .await?;

        Ok(Outcome::Published)
    }

    async fn accumulate(&self, git: &Git<'_, R>) -> Result<Outcome> {
        let branches = &self.config.branches;

        let state = git
            .branch_state(&branches.release, &branches.upstream_remote)
            .await?;
        match state {
            BranchState::Exists => git.checkout(&branches.release).await?,
            BranchState::DoesNotExist => {
                tracing::info!("Creating {} branch", branches.release);
                git.create_branch(&branches.release).await?;
            }
        }

        if !self.should_bump(git, state).await? {
            tracing::info!("No new changesets");
            return Ok(Outcome::NoNewChangesets);
        }

        tracing::info!("Resetting branch to {}", branches.main);
        git.reset_hard(&branches.main).await?;

        tracing::info!("Bumping packages");
        let bump = Invocation::from_command_line(&self.config.commands.bump)?;
        self.runner
            .run_checked(&bump, &self.context.work_tree)
            .await?;

        tracing::info!("Committing changes");
        git.add_all().await?;
        git.commit(&self.config.git.commit_message).await?;

        tracing::info!("Pushing to remote");
        git.force_push(&self.config.git.remote_name, &branches.release)
            .await?;

        self.reconcile_pull_request().await
    }

    /// A new release branch always bumps; an existing one only when main gained changesets
    pub async fn should_bump(&self, git: &Git<'_, R>, state: BranchState) -> Result<bool> {
        if state == BranchState::DoesNotExist {
            return Ok(true);
        }

        let branches = &self.config.branches;
        tracing::info!("Checking if new changesets should be added");
        let diverged_at = git.merge_base(&branches.release, &branches.main).await?;
        let changed = git.changed_files(&diverged_at, &branches.main).await?;
        let should_bump = changesets::touches_changeset_dir(&changed, &self.config.changesets.dir);
        tracing::info!("Checked if new changesets should be added: {}", should_bump);

        Ok(should_bump)
    }

    /// Open the release pull request unless one is already open
    pub async fn reconcile_pull_request(&self) -> Result<Outcome> {
        let target = PullRequestRef {
            repository: self.context.repository.clone(),
            head: self.config.branches.release.clone(),
            base: self.config.branches.main.clone(),
        };

        let open = self.host.count_open_pull_requests(&target).await?;
        if open > 0 {
            tracing::info!("Pull request found");
            return Ok(Outcome::PullRequestExists);
        }

        let created = self
            .host
            .create_pull_request(&NewPullRequest {
                target,
                title: self.config.pull_request.title.clone(),
                body: self.config.pull_request.body.clone(),
            })
            .await?;
        tracing::info!(
            "Created pull request #{} {}",
            created.number,
            created.url.as_deref().unwrap_or_default()
        );

        Ok(Outcome::PullRequestCreated(created))
    }
}
