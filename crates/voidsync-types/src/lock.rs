// SPDX-License-Identifier: Apache-2.0
//! Lock records (§3, §4.4).
//!
//! Resolved open question (§9): a lock with a `pattern` matches **content**,
//! not the path. A lock with no pattern forbids all edits to its exact path.

use serde::{Deserialize, Serialize};

/// Id assigned by the Store on `createLock`.
pub type LockId = i64;

/// A policy object preventing modification of a path, or of content matching
/// a regex, at that path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    /// Assigned by the Store on creation.
    pub id: LockId,
    /// Normalized, unique workspace-relative path this lock guards.
    pub path: String,
    /// Optional content-matching regex. `None` means "forbid all edits".
    pub pattern: Option<String>,
}
