//! Detection of pending changesets in the working tree and in branch diffs.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{ReleaseError, Result};

/// True when any entry name is not one of the `ignored` bookkeeping files
pub fn contains_changesets<I, S>(entries: I, ignored: &[String]) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries
        .into_iter()
        .any(|name| !ignored.iter().any(|ignored| ignored == name.as_ref()))
}

/// List the changeset directory and report whether it holds pending changesets
pub fn has_changesets(dir: &Path, ignored: &[String]) -> Result<bool> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ReleaseError::MissingChangesetDir {
                path: dir.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    tracing::debug!("Changeset directory entries: {:?}", names);

    Ok(contains_changesets(&names, ignored))
}

/// True when any changed path lies inside the changeset directory
pub fn touches_changeset_dir<S: AsRef<str>>(changed: &[S], changeset_dir: &str) -> bool {
    let dir = changeset_dir.trim_start_matches("./").trim_end_matches('/');
    changed.iter().any(|path| {
        path.as_ref()
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
    })
}
