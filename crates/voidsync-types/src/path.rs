// SPDX-License-Identifier: Apache-2.0
//! Workspace-relative path validation and normalization (§4.4, §4.8 precondition 1).

use crate::error::VoidSyncError;

/// Maximum accepted path length, per §4.8 precondition 1.
pub const MAX_PATH_LEN: usize = 500;

/// Normalize a workspace-relative path: forward slashes, no leading `./`.
///
/// Rejects absolute paths and any `..` segment at ingress, per §4.4's
/// normalization rule.
pub fn normalize(path: &str) -> Result<String, VoidSyncError> {
    if path.is_empty() {
        return Err(VoidSyncError::InvalidInput("path is empty".into()));
    }
    if path.len() > MAX_PATH_LEN {
        return Err(VoidSyncError::InvalidInput(format!(
            "path exceeds {MAX_PATH_LEN} bytes"
        )));
    }

    let replaced = path.replace('\\', "/");
    let stripped = replaced.strip_prefix("./").unwrap_or(&replaced);

    if stripped.starts_with('/') {
        return Err(VoidSyncError::InvalidInput(
            "path must be workspace-relative".into(),
        ));
    }

    let mut segments = Vec::new();
    for segment in stripped.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return Err(VoidSyncError::InvalidInput(
                "path may not contain `..`".into(),
            ));
        }
        segments.push(segment);
    }

    if segments.is_empty() {
        return Err(VoidSyncError::InvalidInput(
            "path has no segments".into(),
        ));
    }

    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn normalizes_leading_dot_slash() {
        assert_eq!(normalize("./a.js").unwrap(), "a.js");
    }

    #[test]
    fn rejects_parent_traversal() {
        assert!(normalize("../etc/passwd").is_err());
        assert!(normalize("a/../b").is_err());
    }

    #[test]
    fn rejects_absolute_paths() {
        assert!(normalize("/etc/passwd").is_err());
    }

    #[test]
    fn rejects_overlong_paths() {
        let long = "a".repeat(MAX_PATH_LEN + 1);
        assert!(normalize(&long).is_err());
    }

    #[test]
    fn collapses_backslashes() {
        assert_eq!(normalize("config\\settings.json").unwrap(), "config/settings.json");
    }
}
