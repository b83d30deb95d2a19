use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{ReleaseError, Result};

/// A single external program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build an invocation from a configured `[program, args...]` vector
    pub fn from_command_line(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| ReleaseError::Config("empty command line".to_string()))?;
        Ok(Self::new(program, args.iter().cloned()))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the child was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {code}"),
            None => "a signal".to_string(),
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `invocation` in `cwd` to completion, capturing its output
    async fn run(&self, invocation: &Invocation, cwd: &Path) -> Result<CommandOutput>;

    /// Run and fail unless the exit code is zero or one of `accepted`
    async fn run_accepting(
        &self,
        invocation: &Invocation,
        cwd: &Path,
        accepted: &[i32],
    ) -> Result<CommandOutput> {
        let output = self.run(invocation, cwd).await?;
        let accepted = output
            .code
            .map(|code| code == 0 || accepted.contains(&code))
            .unwrap_or(false);

        if !accepted {
            return Err(ReleaseError::CommandFailed {
                command: invocation.to_string(),
                status: output.status_text(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(output)
    }

    async fn run_checked(&self, invocation: &Invocation, cwd: &Path) -> Result<CommandOutput> {
        self.run_accepting(invocation, cwd, &[]).await
    }
}

/// Runs real child processes through tokio
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation, cwd: &Path) -> Result<CommandOutput> {
        tracing::debug!("Running `{}` in {}", invocation, cwd.display());

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ReleaseError::Spawn {
                command: invocation.to_string(),
                source,
            })?;

        let output = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
            tracing::info!("stdout: {}", line);
        }
        for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
            tracing::info!("stderr: {}", line);
        }

        Ok(output)
    }
}
