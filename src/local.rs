//! Local filesystem side of the mirror
//!
//! The filesystem is the only state store: modification times written by
//! [`reconcile_times`] are read back by [`modified_time`] on the next run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Result of making sure a directory exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryOutcome {
    Existing,
    Created,
    /// Missing, but left alone because this is a dry run
    Planned,
    Failed { error: String },
}

/// Turn a remote display name into a single safe path segment.
///
/// Surrounding whitespace is trimmed, separators and control characters
/// become `_`, and names that cannot stand alone fall back to `fallback`.
pub fn sanitize_name(name: &str, fallback: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => fallback.to_string(),
        _ => cleaned,
    }
}

/// Path of the local directory mirroring a remote folder
pub fn folder_path(parent: &Path, name: &str, id: &str) -> PathBuf {
    parent.join(sanitize_name(name, id))
}

/// Path of an exported artifact: `<dir>/<name>.<extension>`
pub fn artifact_path(dir: &Path, name: &str, id: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}", sanitize_name(name, id), extension))
}

/// Ensure one directory level exists; failures are logged, never raised
pub async fn materialize_directory(path: &Path, dry_run: bool) -> DirectoryOutcome {
    if path.is_dir() {
        return DirectoryOutcome::Existing;
    }

    if dry_run {
        info!("Would create directory '{}'", path.display());
        return DirectoryOutcome::Planned;
    }

    match tokio::fs::create_dir(path).await {
        Ok(()) => {
            info!("Created directory '{}'", path.display());
            DirectoryOutcome::Created
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => {
            DirectoryOutcome::Existing
        }
        Err(e) => {
            error!("Error creating directory '{}': {}", path.display(), e);
            DirectoryOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

/// Modification time of a local file, or `None` when it does not exist
pub async fn modified_time(path: &Path) -> Result<Option<DateTime<Utc>>> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            let modified = metadata
                .modified()
                .with_context(|| format!("Failed to read modification time of {:?}", path))?;
            Ok(Some(DateTime::<Utc>::from(modified)))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to stat {:?}", path)),
    }
}

/// Write an artifact, replacing any previous content
pub async fn write_artifact(path: &Path, contents: &[u8]) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {:?}", path))
}

/// Stamp a file with the remote creation (atime) and modification (mtime) times
pub fn reconcile_times(path: &Path, created: DateTime<Utc>, modified: DateTime<Utc>) -> Result<()> {
    filetime::set_file_times(path, to_file_time(created), to_file_time(modified))
        .with_context(|| format!("Failed to set timestamps on {:?}", path))
}

fn to_file_time(time: DateTime<Utc>) -> FileTime {
    FileTime::from_unix_time(time.timestamp(), time.timestamp_subsec_nanos())
}
