// SPDX-License-Identifier: Apache-2.0
//! The error taxonomy surfaced at every boundary (§7 of the specification).
//!
//! Internal causes may be attached (e.g. an `io::Error` wrapped inside
//! `FilesystemError`) but the outer taxon is never replaced — callers match on
//! the variant, not on the message, and axum handlers map variants to status
//! codes one-to-one.

use thiserror::Error;

/// A single plugin's failure, surfaced as part of [`VoidSyncError::PluginRejected`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PluginFailure {
    /// Id of the plugin that failed.
    pub plugin_id: String,
    /// Human-readable failure message.
    pub message: String,
}

/// The error taxonomy for the change-review pipeline.
#[derive(Debug, Error)]
pub enum VoidSyncError {
    /// Shape, length, traversal, or unknown-field violation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Agent exists but is not `active`.
    #[error("agent {0} is inactive")]
    AgentInactive(String),

    /// No agent record for this identity.
    #[error("agent {0} is unknown")]
    AgentUnknown(String),

    /// Agent policy denied this (agent, path) pair.
    #[error("agent {agent} may not edit {path}")]
    Forbidden {
        /// Agent identity.
        agent: String,
        /// Path that was denied.
        path: String,
    },

    /// The lock registry denied this path or content.
    #[error("path {0} is locked")]
    Locked(String),

    /// The agent has exceeded its rate limit, or is under a standing block.
    #[error("agent {0} is rate limited")]
    RateLimited(String),

    /// At least one plugin failed; carries per-plugin messages.
    #[error("plugin pipeline rejected the change ({} failure(s))", .0.len())]
    PluginRejected(Vec<PluginFailure>),

    /// Production fingerprint changed between submit and approve, or the
    /// stored diff no longer applies cleanly.
    #[error("path {0} has drifted since submission")]
    Drifted(String),

    /// Requested state transition is not one of the two admissible ones.
    #[error("invalid transition for change {0}")]
    InvalidTransition(ChangeIdDisplay),

    /// Requested entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The Store failed to read or write.
    #[error("storage error: {0}")]
    StorageError(String),

    /// A filesystem operation (sandbox or production tree) failed.
    #[error("filesystem error: {0}")]
    FilesystemError(String),

    /// Unclassified failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Thin wrapper so [`VoidSyncError::InvalidTransition`] can carry a bare id
/// without pulling the `change` module into every `Display` impl call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeIdDisplay(pub i64);

impl std::fmt::Display for ChangeIdDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl VoidSyncError {
    /// The conventional HTTP status code for this error, per §6.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::AgentInactive(_) | Self::Forbidden { .. } | Self::Locked(_) => 403,
            Self::AgentUnknown(_) | Self::NotFound(_) => 404,
            Self::RateLimited(_) => 429,
            Self::PluginRejected(_) => 422,
            Self::Drifted(_) | Self::InvalidTransition(_) => 409,
            Self::StorageError(_) | Self::FilesystemError(_) | Self::Internal(_) => 500,
        }
    }
}
