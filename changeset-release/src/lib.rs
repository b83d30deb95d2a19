//! # changeset-release
//!
//! Release automation for repositories that track pending version bumps as
//! changeset files.
//!
//! ## Overview
//!
//! `changeset-release` runs in CI on every push to the main branch. It looks at
//! the `.changeset` directory of the checkout and takes one of two paths:
//!
//! - No pending changesets: authenticate to the package registry, run the
//!   package manager's release command and push the tags it created.
//! - Pending changesets: keep a long-lived `changeset-release` branch in sync
//!   with main, apply the version bumps there, force-push it and make sure a
//!   single pull request proposes merging it back into main.
//!
//! Runs on any other branch do nothing and exit successfully.
//!
//! ## Usage
//!
//! ```bash
//! # In CircleCI every input comes from the environment
//! changeset-release
//!
//! # Outside CircleCI pass the same inputs as flags
//! changeset-release --owner acme --repo widgets --branch master \
//!     --actor release-bot --github-token "$TOKEN" --npm-token "$NPM_TOKEN" \
//!     --home "$HOME"
//! ```
//!
//! ## Configuration
//!
//! Branch names, the changeset directory, the package-manager commands and the
//! pull request title can be set in `.config/changeset-release.toml` in the
//! checkout or `~/.config/changeset-release.toml` for user-wide settings.

/// Pending changeset detection
pub mod changesets;

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Configuration file handling and default settings management
pub mod config;

/// Scoped `.netrc` and `.npmrc` credential files
pub mod credentials;

/// Error types and error handling utilities
pub mod error;

/// System git operations used by the release flow
pub mod git;

/// GitHub pull request search and creation
pub mod github;

/// External process execution with exit status checking
pub mod process;

/// The release orchestration itself
pub mod releaser;

/// Network retry logic with exponential backoff
pub mod retry;
