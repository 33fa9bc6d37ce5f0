// SPDX-License-Identifier: Apache-2.0
//! Unified-diff creation, application, applicability checks, and change
//! summaries (§4.3).
//!
//! Built on [`diffy`], the ecosystem's unified-diff/patch crate, rather than
//! a hand-rolled Myers implementation.

use diffy::{DiffOptions, Patch};
use thiserror::Error;

/// Default context-line count when callers don't specify one (§4.3).
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Diff-engine failure modes.
#[derive(Debug, Error)]
pub enum DiffError {
    /// The patch's hunks no longer apply cleanly to the given base content.
    #[error("patch does not apply cleanly")]
    PatchFailed,
    /// The patch text itself could not be parsed as a unified diff.
    #[error("malformed patch: {0}")]
    Malformed(String),
}

/// A change-size summary between two text blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DiffSummary {
    /// Number of added lines.
    pub added_lines: usize,
    /// Number of removed lines.
    pub removed_lines: usize,
    /// `(added + removed) / max(original_line_count, 1) * 100`, rounded down.
    pub percent_changed: u32,
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Create a unified diff from `original` to `modified`, with the file name in
/// the patch header set to the basename of `path` (§4.3).
#[must_use]
pub fn create_diff(path: &str, original: &str, modified: &str, context_lines: usize) -> String {
    let name = basename(path);
    let patch = DiffOptions::new()
        .set_context_len(context_lines)
        .set_original_filename(name)
        .set_modified_filename(name)
        .create_patch(original, modified);
    patch.to_string()
}

/// Create a unified diff using the default context-line count.
#[must_use]
pub fn create_diff_default(path: &str, original: &str, modified: &str) -> String {
    create_diff(path, original, modified, DEFAULT_CONTEXT_LINES)
}

/// Apply `patch_text` to `original`, returning the resulting content.
///
/// # Errors
///
/// Returns [`DiffError::Malformed`] if `patch_text` does not parse as a
/// unified diff, or [`DiffError::PatchFailed`] if it parses but its hunks do
/// not apply cleanly to `original`.
pub fn apply_diff(patch_text: &str, original: &str) -> Result<String, DiffError> {
    let patch = Patch::from_str(patch_text).map_err(|e| DiffError::Malformed(e.to_string()))?;
    diffy::apply(original, &patch).map_err(|_| DiffError::PatchFailed)
}

/// `true` iff `patch_text` parses and its hunks apply cleanly to `current`.
#[must_use]
pub fn can_apply(patch_text: &str, current: &str) -> bool {
    apply_diff(patch_text, current).is_ok()
}

/// Summarize the size of the change from `original` to `modified`.
#[must_use]
pub fn summarize(original: &str, modified: &str) -> DiffSummary {
    // Zero context keeps every changed line inside a hunk body so the
    // added/removed tally below doesn't have to special-case context lines
    // bleeding in from neighboring hunks.
    let patch = DiffOptions::new()
        .set_context_len(0)
        .create_patch(original, modified);

    let mut added_lines = 0usize;
    let mut removed_lines = 0usize;
    for hunk in patch.hunks() {
        for line in hunk.lines() {
            match line {
                diffy::Line::Insert(_) => added_lines += 1,
                diffy::Line::Delete(_) => removed_lines += 1,
                diffy::Line::Context(_) => {}
            }
        }
    }

    let original_line_count = original.lines().count().max(1);
    let percent_changed =
        ((added_lines + removed_lines) * 100 / original_line_count).min(u32::MAX as usize) as u32;

    DiffSummary {
        added_lines,
        removed_lines,
        percent_changed,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn round_trip_on_simple_edit() {
        let original = "x=1\n";
        let modified = "x=2\n";
        let patch = create_diff_default("a.js", original, modified);
        assert_eq!(apply_diff(&patch, original).unwrap(), modified);
    }

    #[test]
    fn header_uses_basename() {
        let patch = create_diff_default("config/settings.json", "a\n", "b\n");
        assert!(patch.contains("settings.json"));
        assert!(!patch.contains("config/settings.json"));
    }

    #[test]
    fn stale_patch_fails_to_apply() {
        let patch = create_diff_default("a.js", "x=1\n", "x=2\n");
        // content has drifted away from the captured original
        assert!(!can_apply(&patch, "x=999\n"));
    }

    #[test]
    fn summarize_counts_changed_lines() {
        let summary = summarize("a\nb\nc\n", "a\nB\nc\nd\n");
        assert_eq!(summary.removed_lines, 1);
        assert_eq!(summary.added_lines, 2);
    }

    proptest! {
        #[test]
        fn round_trip_holds_for_arbitrary_text(
            a in "[a-z\n]{0,64}",
            b in "[a-z\n]{0,64}",
        ) {
            let patch = create_diff_default("p.txt", &a, &b);
            prop_assert_eq!(apply_diff(&patch, &a).unwrap(), b);
        }
    }
}
