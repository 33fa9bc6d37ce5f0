// SPDX-License-Identifier: Apache-2.0
//! Change records and the three-state approval state machine (§3, §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonic integer id assigned by the Store on `createChange`.
pub type ChangeId = i64;

/// Status of a [`Change`]. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    /// Awaiting operator decision.
    Pending,
    /// Committed to production.
    Approved,
    /// Discarded; no filesystem mutation occurred.
    Rejected,
}

impl ChangeStatus {
    /// Whether `self -> next` is one of the two admissible transitions.
    ///
    /// `pending -> approved` and `pending -> rejected` are legal; every other
    /// pair (including `pending -> pending`) is not.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved) | (Self::Pending, Self::Rejected)
        )
    }
}

/// Free-form metadata captured on submission (submitter model, client
/// timestamp, etc.) plus operator-supplied fields recorded on resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeMetadata {
    /// Arbitrary submitter-supplied fields (model name, client timestamp, …).
    #[serde(default)]
    pub submitter: serde_json::Value,
    /// Operator identity that approved this change, if approved.
    #[serde(default)]
    pub approved_by: Option<String>,
    /// Reason text supplied on rejection, if rejected.
    #[serde(default)]
    pub reason: Option<String>,
    /// Warnings accumulated from the plugin pipeline (never promoted to errors).
    #[serde(default)]
    pub plugin_warnings: Vec<String>,
    /// Underlying cause when a change was auto-rejected by a filesystem fault
    /// during approval staging (§4.9 failure semantics).
    #[serde(default)]
    pub failure_cause: Option<String>,
    /// Fingerprint of `original_content`, captured at submission, for drift
    /// detection at approval time (§4.8).
    #[serde(default)]
    pub submitted_fingerprint: Option<String>,
}

/// A proposal to replace the content of a single workspace-relative path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Assigned by the Store on creation.
    pub id: ChangeId,
    /// Identity of the submitting agent.
    pub agent_id: String,
    /// Workspace-relative target path.
    pub path: String,
    /// Unified diff text from original to proposed content.
    pub diff: String,
    /// Original content captured at submission time, for audit and rebuild.
    pub original_content: String,
    /// Current lifecycle status.
    pub status: ChangeStatus,
    /// Opaque metadata.
    pub metadata: ChangeMetadata,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp; bumped on every status transition.
    pub updated_at: DateTime<Utc>,
}

/// Filter accepted by `Store::list_changes` / `ChangeManager::list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFilter {
    /// Restrict to changes with this status.
    pub status: Option<ChangeStatus>,
    /// Restrict to changes submitted by this agent.
    pub agent_id: Option<String>,
    /// Restrict to changes created at or after this instant.
    pub submitted_after: Option<DateTime<Utc>>,
    /// Restrict to changes created at or before this instant.
    pub submitted_before: Option<DateTime<Utc>>,
    /// Pagination offset (0-based).
    #[serde(default)]
    pub offset: usize,
    /// Pagination page size; `None` returns all matching rows.
    pub limit: Option<usize>,
}

/// A page of changes plus the total count of rows matching the filter
/// before pagination was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePage {
    /// The page of matching changes.
    pub changes: Vec<Change>,
    /// Total rows matching the filter, ignoring `offset`/`limit`.
    pub total: usize,
    /// Echoed back from the request for client-side paging.
    pub offset: usize,
}
