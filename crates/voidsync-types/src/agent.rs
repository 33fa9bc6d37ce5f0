// SPDX-License-Identifier: Apache-2.0
//! Agent identity, status, and policy metadata (§3).

use serde::{Deserialize, Serialize};

/// Coarse behavioral kind of an agent, dispatched on by the capability layer
/// in `voidsync-agents` (§9, "dynamic class hierarchy of agents").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Proposes content changes.
    Editor,
    /// Reviews and may comment, but does not propose edits by default.
    Reviewer,
    /// Any other agent kind; behaves like `Editor` for policy purposes.
    Other,
}

/// Lifecycle status of an agent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// May submit changes, subject to policy/locks/rate limits.
    Active,
    /// May not submit changes; `submit` fails with `AgentInactive`.
    Inactive,
}

/// The permission policy and soft limits carried in an agent's metadata bag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetadata {
    /// Regex patterns the agent may edit. Empty means unrestricted.
    ///
    /// Each entry must be a valid regex; shell-glob dialects (`*.js`) are
    /// never auto-translated (§9 open question, resolved).
    #[serde(default)]
    pub can_edit: Vec<String>,
    /// Whether this (typically `reviewer`) agent may leave comments.
    #[serde(default)]
    pub can_comment: bool,
    /// Optional per-day change cap, enforced alongside the rate limiter.
    #[serde(default)]
    pub max_changes_per_day: Option<u32>,
}

/// An external actor that proposes file changes.
///
/// Identity is immutable once created; `status` and `metadata` are mutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Stable, human-readable identity (e.g. `"GPT-4"`).
    pub identity: String,
    /// Display name shown to operators.
    pub display_name: String,
    /// Coarse agent kind.
    pub kind: AgentKind,
    /// Current lifecycle status.
    pub status: AgentStatus,
    /// Permission policy and soft limits.
    pub metadata: AgentMetadata,
}

impl Agent {
    /// Construct an `active` agent with no edit restrictions.
    #[must_use]
    pub fn new(identity: impl Into<String>, display_name: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            identity: identity.into(),
            display_name: display_name.into(),
            kind,
            status: AgentStatus::Active,
            metadata: AgentMetadata::default(),
        }
    }
}
