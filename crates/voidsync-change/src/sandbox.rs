// SPDX-License-Identifier: Apache-2.0
//! Sandbox staging helpers: the tree that mirrors production subpaths
//! touched by in-flight approvals (§4.8, §6).

use std::path::{Path, PathBuf};

use voidsync_types::VoidSyncError;

fn io_err(context: &str, err: std::io::Error) -> VoidSyncError {
    VoidSyncError::FilesystemError(format!("{context}: {err}"))
}

/// Read `path`'s current staged content from the sandbox tree if it has
/// already been touched in this session, falling back to `fallback` (the
/// production content) otherwise.
pub async fn read_staged_or(
    sandbox_root: &Path,
    path: &str,
    fallback: &str,
) -> Result<String, VoidSyncError> {
    let staged_path = sandbox_root.join(path);
    match tokio::fs::read_to_string(&staged_path).await {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(fallback.to_string()),
        Err(err) => Err(io_err("reading staged sandbox file", err)),
    }
}

/// Write `content` to `path` under the sandbox tree, creating parent
/// directories as needed.
pub async fn write_staged(
    sandbox_root: &Path,
    path: &str,
    content: &str,
) -> Result<(), VoidSyncError> {
    let staged_path = sandbox_root.join(path);
    if let Some(parent) = staged_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| io_err("creating sandbox directory", err))?;
    }
    tokio::fs::write(&staged_path, content.as_bytes())
        .await
        .map_err(|err| io_err("writing sandbox file", err))
}

/// Remove `path` from the sandbox tree, tolerating its absence — used to
/// roll back a staged write whose `DuringSync` plugin run failed.
pub async fn rollback(sandbox_root: &Path, path: &str) -> Result<(), VoidSyncError> {
    let staged_path = sandbox_root.join(path);
    match tokio::fs::remove_file(&staged_path).await {
        Ok(()) | Err(_) => Ok(()),
    }
}

/// Read `path`'s current production content, or an empty string if the
/// file does not yet exist.
pub async fn read_production(
    workspace_root: &Path,
    path: &str,
) -> Result<String, VoidSyncError> {
    let production_path = workspace_root.join(path);
    match tokio::fs::read_to_string(&production_path).await {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err("reading production file", err)),
    }
}

/// Copy `path` from the sandbox tree into production, preserving directory
/// structure, and return the bytes written (so the caller can fingerprint
/// them without a second read).
pub async fn commit_to_production(
    sandbox_root: &Path,
    workspace_root: &Path,
    path: &str,
) -> Result<Vec<u8>, VoidSyncError> {
    let staged_path = sandbox_root.join(path);
    let production_path: PathBuf = workspace_root.join(path);
    let bytes = tokio::fs::read(&staged_path)
        .await
        .map_err(|err| io_err("reading staged file for commit", err))?;
    if let Some(parent) = production_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| io_err("creating production directory", err))?;
    }
    tokio::fs::write(&production_path, &bytes)
        .await
        .map_err(|err| io_err("writing production file", err))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[tokio::test]
    async fn write_then_read_staged_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        write_staged(dir.path(), "a/b.txt", "hi").await.unwrap();
        let content = read_staged_or(dir.path(), "a/b.txt", "fallback").await.unwrap();
        assert_eq!(content, "hi");
    }

    #[tokio::test]
    async fn read_staged_falls_back_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let content = read_staged_or(dir.path(), "missing.txt", "fallback").await.unwrap();
        assert_eq!(content, "fallback");
    }

    #[tokio::test]
    async fn commit_copies_staged_bytes_into_production() {
        let sandbox = tempfile::tempdir().unwrap();
        let production = tempfile::tempdir().unwrap();
        write_staged(sandbox.path(), "x.js", "x=2\n").await.unwrap();
        let bytes = commit_to_production(sandbox.path(), production.path(), "x.js")
            .await
            .unwrap();
        assert_eq!(bytes, b"x=2\n");
        let on_disk = tokio::fs::read_to_string(production.path().join("x.js")).await.unwrap();
        assert_eq!(on_disk, "x=2\n");
    }
}
