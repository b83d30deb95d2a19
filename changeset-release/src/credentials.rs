//! Credential files written into the home directory for the length of a run.
//!
//! `.netrc` lets git authenticate HTTPS pushes as the actor and `.npmrc` lets
//! the package manager publish. Both are written owner-readable only and are
//! restored to their previous state when the [`CredentialFile`] guard drops,
//! unless the guard was told to keep them.

use secrecy::{ExposeSecret, SecretString};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Username and token the run acts as
#[derive(Debug, Clone)]
pub struct ActorCredentials {
    pub username: String,
    pub token: SecretString,
}

impl ActorCredentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: SecretString::from(token.into()),
        }
    }

    pub fn noreply_email(&self) -> String {
        format!("{}@users.noreply.github.com", self.username)
    }
}

pub fn netrc_contents(host: &str, credentials: &ActorCredentials) -> String {
    format!(
        "machine {}\nlogin {}\npassword {}",
        host,
        credentials.username,
        credentials.token.expose_secret()
    )
}

pub fn npmrc_contents(registry_host: &str, token: &SecretString) -> String {
    format!("//{}/:_authToken={}", registry_host, token.expose_secret())
}

/// A secret file that is removed, or put back as it was, on drop
#[derive(Debug)]
pub struct CredentialFile {
    path: PathBuf,
    previous: Option<Vec<u8>>,
    keep: bool,
}

impl CredentialFile {
    pub fn write(path: impl Into<PathBuf>, contents: &str, keep: bool) -> Result<Self> {
        let path = path.into();
        let previous = match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        write_private(&path, contents.as_bytes())?;
        tracing::debug!("Wrote credentials to {}", path.display());

        Ok(Self {
            path,
            previous,
            keep,
        })
    }
}

impl Drop for CredentialFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }

        let result = match self.previous.take() {
            Some(bytes) => write_private(&self.path, &bytes),
            None => fs::remove_file(&self.path),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to clean up {}: {}", self.path.display(), e);
        }
    }
}

fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}
