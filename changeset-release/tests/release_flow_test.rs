//! End-to-end tests of the release flow against recording fakes for git,
//! the package manager and GitHub.

use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

use changeset_release::config::Config;
use changeset_release::credentials::ActorCredentials;
use changeset_release::error::{ReleaseError, Result};
use changeset_release::github::{
    CreatedPullRequest, NewPullRequest, PullRequestHost, PullRequestRef, Repository,
};
use changeset_release::process::{CommandOutput, CommandRunner, Invocation};
use changeset_release::releaser::{Outcome, ReleaseContext, Releaser};

const SETUP_CALLS: [&str; 5] = [
    "git config --global user.name octocat",
    "git config --global user.email octocat@users.noreply.github.com",
    "git config --global --unset-all url.ssh://git@github.com.insteadof",
    "git remote get-url gh-https",
    "git remote add gh-https https://github.com/acme/widgets",
];

/// Records every invocation and answers from a table, succeeding by default
struct FakeRunner {
    home: PathBuf,
    calls: Mutex<Vec<String>>,
    responses: Mutex<HashMap<String, CommandOutput>>,
    npmrc_during_release: Mutex<Option<String>>,
}

impl FakeRunner {
    fn new(home: &Path) -> Self {
        let runner = Self {
            home: home.to_path_buf(),
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(HashMap::new()),
            npmrc_during_release: Mutex::new(None),
        };
        runner.respond("git remote get-url gh-https", 2, "");
        runner.respond(
            "git rev-parse --verify --quiet refs/heads/changeset-release",
            1,
            "",
        );
        runner.respond(
            "git rev-parse --verify --quiet refs/remotes/origin/changeset-release",
            1,
            "",
        );
        runner
    }

    fn respond(&self, command: &str, code: i32, stdout: &str) {
        self.responses.lock().unwrap().insert(
            command.to_string(),
            CommandOutput {
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
    }

    fn with_existing_release_branch(self, merge_base: &str, diff: &[&str]) -> Self {
        self.respond(
            "git rev-parse --verify --quiet refs/remotes/origin/changeset-release",
            0,
            "0f0f0f0\n",
        );
        self.respond(
            "git merge-base changeset-release master",
            0,
            &format!("{merge_base}\n"),
        );
        self.respond(
            &format!("git -c core.quotePath=false diff --name-only -z {merge_base}...master"),
            0,
            &diff.join("\0"),
        );
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|call| call.starts_with(prefix))
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, invocation: &Invocation, _cwd: &Path) -> Result<CommandOutput> {
        let command = invocation.to_string();
        self.calls.lock().unwrap().push(command.clone());

        if command == "yarn release" {
            *self.npmrc_during_release.lock().unwrap() =
                fs::read_to_string(self.home.join(".npmrc")).ok();
        }

        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(&command)
            .cloned()
            .unwrap_or(CommandOutput {
                code: Some(0),
                ..Default::default()
            }))
    }
}

/// In-memory pull request store; created pull requests count as open
#[derive(Default)]
struct FakeHost {
    open: AtomicUsize,
    searches: AtomicUsize,
    created: Mutex<Vec<NewPullRequest>>,
}

impl FakeHost {
    fn with_open(open: usize) -> Self {
        let host = Self::default();
        host.open.store(open, Ordering::SeqCst);
        host
    }

    fn created(&self) -> Vec<NewPullRequest> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl PullRequestHost for FakeHost {
    async fn count_open_pull_requests(&self, target: &PullRequestRef) -> Result<usize> {
        assert_eq!(
            target.open_search_query(),
            "repo:acme/widgets state:open head:changeset-release base:master"
        );
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.open.load(Ordering::SeqCst))
    }

    async fn create_pull_request(&self, request: &NewPullRequest) -> Result<CreatedPullRequest> {
        self.created.lock().unwrap().push(request.clone());
        let number = self.open.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        Ok(CreatedPullRequest {
            number,
            url: Some(format!("https://github.com/acme/widgets/pull/{number}")),
        })
    }
}

struct Checkout {
    work_tree: TempDir,
    home: TempDir,
}

impl Checkout {
    fn with_changeset_dir(entries: &[&str]) -> Self {
        let work_tree = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let dir = work_tree.path().join(".changeset");
        fs::create_dir_all(&dir).unwrap();
        for entry in entries {
            fs::write(dir.join(entry), "---\n\"foo\": patch\n---\n").unwrap();
        }
        Self { work_tree, home }
    }

    fn context(&self, branch: &str) -> ReleaseContext {
        ReleaseContext {
            repository: Repository::new("acme", "widgets"),
            current_branch: branch.to_string(),
            actor: ActorCredentials::new("octocat", "ghp_secret"),
            registry_token: SecretString::from("npm_secret".to_string()),
            home: self.home.path().to_path_buf(),
            work_tree: self.work_tree.path().to_path_buf(),
        }
    }

    fn runner(&self) -> FakeRunner {
        FakeRunner::new(self.home.path())
    }
}

#[tokio::test]
async fn test_other_branch_is_a_no_op() {
    let checkout = Checkout::with_changeset_dir(&["config.js", "README.md", "add-foo.md"]);
    let runner = checkout.runner();
    let host = FakeHost::default();

    let outcome = Releaser::new(Config::default(), checkout.context("feature/x"), &runner, &host)
        .run()
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Skipped {
            branch: "feature/x".to_string()
        }
    );
    assert!(runner.calls().is_empty());
    assert_eq!(host.searches.load(Ordering::SeqCst), 0);
    assert!(host.created().is_empty());
    assert!(!checkout.home.path().join(".netrc").exists());
}

#[tokio::test]
async fn test_publishes_when_no_changesets() {
    let checkout = Checkout::with_changeset_dir(&["config.js", "README.md"]);
    let runner = checkout.runner();
    let host = FakeHost::default();

    let outcome = Releaser::new(Config::default(), checkout.context("master"), &runner, &host)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Published);

    let mut expected: Vec<String> = SETUP_CALLS.iter().map(|c| c.to_string()).collect();
    expected.push("yarn release".to_string());
    expected.push("git push --follow-tags gh-https master".to_string());
    assert_eq!(runner.calls(), expected);

    assert_eq!(
        runner.npmrc_during_release.lock().unwrap().as_deref(),
        Some("//registry.npmjs.org/:_authToken=npm_secret")
    );
    assert_eq!(host.searches.load(Ordering::SeqCst), 0);

    // credential files do not outlive the run
    assert!(!checkout.home.path().join(".npmrc").exists());
    assert!(!checkout.home.path().join(".netrc").exists());
}

#[tokio::test]
async fn test_failed_release_is_fatal_and_pushes_nothing() {
    let checkout = Checkout::with_changeset_dir(&["README.md"]);
    let runner = checkout.runner();
    runner.respond("yarn release", 1, "");
    let host = FakeHost::default();

    let err = Releaser::new(Config::default(), checkout.context("master"), &runner, &host)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ReleaseError::ReleaseFailed { .. }));
    assert!(err.to_string().contains("yarn release"));
    assert!(!runner.called("git push"));
}

#[tokio::test]
async fn test_new_release_branch_bumps_and_opens_pull_request() {
    let checkout = Checkout::with_changeset_dir(&["config.js", "README.md", "add-foo.md"]);
    let runner = checkout.runner();
    let host = FakeHost::default();

    let outcome = Releaser::new(Config::default(), checkout.context("master"), &runner, &host)
        .run()
        .await
        .unwrap();

    let mut expected: Vec<String> = SETUP_CALLS.iter().map(|c| c.to_string()).collect();
    expected.extend(
        [
            "git rev-parse --verify --quiet refs/heads/changeset-release",
            "git rev-parse --verify --quiet refs/remotes/origin/changeset-release",
            "git checkout -b changeset-release",
            "git reset --hard master",
            "yarn changeset bump",
            "git add .",
            "git commit -m Bump Packages",
            "git push gh-https changeset-release --force",
        ]
        .map(String::from),
    );
    assert_eq!(runner.calls(), expected);
    assert!(!runner.called("git merge-base"));

    let created = host.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].title, "Bump Packages");
    assert_eq!(created[0].target.head, "changeset-release");
    assert_eq!(created[0].target.base, "master");
    assert_eq!(
        outcome,
        Outcome::PullRequestCreated(CreatedPullRequest {
            number: 1,
            url: Some("https://github.com/acme/widgets/pull/1".to_string()),
        })
    );
}

#[tokio::test]
async fn test_existing_branch_without_new_changesets_stops() {
    let checkout = Checkout::with_changeset_dir(&["config.js", "README.md", "add-foo.md"]);
    let runner = checkout
        .runner()
        .with_existing_release_branch("abc1234", &["packages/foo/index.js", "CHANGELOG.md"]);
    let host = FakeHost::default();

    let outcome = Releaser::new(Config::default(), checkout.context("master"), &runner, &host)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::NoNewChangesets);
    assert!(runner.called("git checkout changeset-release"));
    assert!(runner.called("git merge-base changeset-release master"));
    assert!(runner.called("git -c core.quotePath=false diff --name-only -z abc1234...master"));
    for step in ["git reset", "yarn changeset bump", "git commit", "git push"] {
        assert!(!runner.called(step), "unexpected `{step}`");
    }
    assert_eq!(host.searches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_existing_branch_with_new_changesets_reuses_open_pull_request() {
    let checkout = Checkout::with_changeset_dir(&["config.js", "README.md", "add-foo.md"]);
    let runner = checkout
        .runner()
        .with_existing_release_branch("abc1234", &["packages/foo/index.js", ".changeset/add-foo.md"]);
    let host = FakeHost::with_open(1);

    let outcome = Releaser::new(Config::default(), checkout.context("master"), &runner, &host)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::PullRequestExists);
    assert!(!runner.called("git checkout -b"));
    assert!(runner.called("git reset --hard master"));
    assert!(runner.called("git push gh-https changeset-release --force"));
    assert_eq!(host.searches.load(Ordering::SeqCst), 1);
    assert!(host.created().is_empty());
}

#[tokio::test]
async fn test_non_ascii_changeset_in_diff_triggers_bump() {
    let checkout = Checkout::with_changeset_dir(&["café-release.md"]);
    let runner = checkout
        .runner()
        .with_existing_release_branch("abc1234", &["src/naïve.js", ".changeset/café-release.md"]);
    let host = FakeHost::default();

    let outcome = Releaser::new(Config::default(), checkout.context("master"), &runner, &host)
        .run()
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::PullRequestCreated(_)));
    assert!(runner.called("git reset --hard master"));
    assert!(runner.called("yarn changeset bump"));
    assert_eq!(host.created().len(), 1);
}

#[tokio::test]
async fn test_pull_request_reconciliation_is_idempotent() {
    let checkout = Checkout::with_changeset_dir(&["add-foo.md"]);
    let runner = checkout.runner();
    let host = FakeHost::default();
    let releaser = Releaser::new(Config::default(), checkout.context("master"), &runner, &host);

    let first = releaser.reconcile_pull_request().await.unwrap();
    let second = releaser.reconcile_pull_request().await.unwrap();

    assert!(matches!(first, Outcome::PullRequestCreated(_)));
    assert_eq!(second, Outcome::PullRequestExists);
    assert_eq!(host.created().len(), 1);
}

#[tokio::test]
async fn test_failed_commit_stops_before_push() {
    let checkout = Checkout::with_changeset_dir(&["add-foo.md"]);
    let runner = checkout.runner();
    runner.respond("git commit -m Bump Packages", 1, "");
    let host = FakeHost::default();

    let err = Releaser::new(Config::default(), checkout.context("master"), &runner, &host)
        .run()
        .await
        .unwrap_err();

    match err {
        ReleaseError::CommandFailed { command, status, .. } => {
            assert_eq!(command, "git commit -m Bump Packages");
            assert_eq!(status, "exit code 1");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!runner.called("git push"));
    assert_eq!(host.searches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_changeset_directory_is_an_error() {
    let checkout = Checkout::with_changeset_dir(&[]);
    fs::remove_dir(checkout.work_tree.path().join(".changeset")).unwrap();
    let runner = checkout.runner();
    let host = FakeHost::default();

    let err = Releaser::new(Config::default(), checkout.context("master"), &runner, &host)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ReleaseError::MissingChangesetDir { .. }));
    assert!(!runner.called("yarn"));
}

#[tokio::test]
async fn test_configured_branches_and_kept_credentials() {
    let checkout = Checkout::with_changeset_dir(&["config.js"]);
    let runner = checkout.runner();
    let host = FakeHost::default();

    let mut config = Config::default();
    config.branches.main = "main".to_string();
    config.commands.release = vec!["pnpm".to_string(), "release".to_string()];
    config.credentials.keep = true;

    let outcome = Releaser::new(config, checkout.context("main"), &runner, &host)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Published);
    assert!(runner.called("pnpm release"));
    assert!(runner.called("git push --follow-tags gh-https main"));
    assert_eq!(
        fs::read_to_string(checkout.home.path().join(".netrc")).unwrap(),
        "machine github.com\nlogin octocat\npassword ghp_secret"
    );
}
