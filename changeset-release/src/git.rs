use std::path::PathBuf;

use crate::error::{ReleaseError, Result};
use crate::process::{CommandRunner, CommandOutput, Invocation};

/// `git config --unset-all` exits with 5 when the key is not set
const CONFIG_KEY_MISSING: i32 = 5;

/// Whether a branch reference is present locally or on the upstream remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchState {
    Exists,
    DoesNotExist,
}

/// System git driven through a [`CommandRunner`], rooted at one working tree
pub struct Git<'a, R: CommandRunner> {
    runner: &'a R,
    work_tree: PathBuf,
}

impl<'a, R: CommandRunner> Git<'a, R> {
    pub fn new(runner: &'a R, work_tree: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            work_tree: work_tree.into(),
        }
    }

    async fn git<const N: usize>(&self, args: [&str; N]) -> Result<CommandOutput> {
        self.runner
            .run_checked(&Invocation::new("git", args), &self.work_tree)
            .await
    }

    /// Set the global commit identity for the actor
    pub async fn configure_identity(&self, name: &str, email: &str) -> Result<()> {
        self.git(["config", "--global", "user.name", name]).await?;
        self.git(["config", "--global", "user.email", email]).await?;
        Ok(())
    }

    /// Drop every global `url.ssh://git@<host>.insteadof` rewrite
    pub async fn unset_ssh_rewrite(&self, host: &str) -> Result<()> {
        let key = format!("url.ssh://git@{host}.insteadof");
        let output = self
            .runner
            .run_accepting(
                &Invocation::new("git", ["config", "--global", "--unset-all", key.as_str()]),
                &self.work_tree,
                &[CONFIG_KEY_MISSING],
            )
            .await?;

        if output.code == Some(CONFIG_KEY_MISSING) {
            tracing::debug!("No ssh rewrite configured for {}", host);
        }
        Ok(())
    }

    /// Point `name` at `url`, adding the remote or updating an existing one
    pub async fn ensure_remote(&self, name: &str, url: &str) -> Result<()> {
        let existing = self
            .runner
            .run(
                &Invocation::new("git", ["remote", "get-url", name]),
                &self.work_tree,
            )
            .await?;

        if existing.success() {
            if existing.stdout.trim() != url {
                tracing::info!("Updating remote {} to {}", name, url);
                self.git(["remote", "set-url", name, url]).await?;
            }
        } else {
            self.git(["remote", "add", name, url]).await?;
        }
        Ok(())
    }

    async fn ref_exists(&self, reference: &str) -> Result<bool> {
        let output = self
            .runner
            .run(
                &Invocation::new("git", ["rev-parse", "--verify", "--quiet", reference]),
                &self.work_tree,
            )
            .await?;
        Ok(output.success())
    }

    /// Look up `branch` under `refs/heads` and then under the remote's tracking refs
    pub async fn branch_state(&self, branch: &str, remote: &str) -> Result<BranchState> {
        if self.ref_exists(&format!("refs/heads/{branch}")).await?
            || self
                .ref_exists(&format!("refs/remotes/{remote}/{branch}"))
                .await?
        {
            Ok(BranchState::Exists)
        } else {
            Ok(BranchState::DoesNotExist)
        }
    }

    /// Switch to an existing branch, creating a tracking branch when only the remote has it
    pub async fn checkout(&self, branch: &str) -> Result<()> {
        self.git(["checkout", branch]).await?;
        Ok(())
    }

    /// Create `branch` at the current HEAD and switch to it
    pub async fn create_branch(&self, branch: &str) -> Result<()> {
        self.git(["checkout", "-b", branch]).await?;
        Ok(())
    }

    pub async fn merge_base(&self, a: &str, b: &str) -> Result<String> {
        let output = self.git(["merge-base", a, b]).await?;
        let base = output.stdout.trim();
        if base.is_empty() {
            return Err(ReleaseError::MissingMergeBase {
                branch: a.to_string(),
                base: b.to_string(),
            });
        }
        Ok(base.to_string())
    }

    /// Paths changed on `to` since it diverged from `from` (`from...to`), unquoted
    pub async fn changed_files(&self, from: &str, to: &str) -> Result<Vec<String>> {
        let range = format!("{from}...{to}");
        let output = self
            .git([
                "-c",
                "core.quotePath=false",
                "diff",
                "--name-only",
                "-z",
                range.as_str(),
            ])
            .await?;
        Ok(output
            .stdout
            .split('\0')
            .filter(|path| !path.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn reset_hard(&self, target: &str) -> Result<()> {
        self.git(["reset", "--hard", target]).await?;
        Ok(())
    }

    pub async fn add_all(&self) -> Result<()> {
        self.git(["add", "."]).await?;
        Ok(())
    }

    pub async fn commit(&self, message: &str) -> Result<()> {
        self.git(["commit", "-m", message]).await?;
        Ok(())
    }

    pub async fn force_push(&self, remote: &str, branch: &str) -> Result<()> {
        self.git(["push", remote, branch, "--force"]).await?;
        Ok(())
    }

    /// Push `branch` together with the annotated tags reachable from it
    pub async fn push_with_tags(&self, remote: &str, branch: &str) -> Result<()> {
        self.git(["push", "--follow-tags", remote, branch]).await?;
        Ok(())
    }
}
