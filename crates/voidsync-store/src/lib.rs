// SPDX-License-Identifier: Apache-2.0
//! The repository abstraction for the five entities owned by the pipeline
//! (§3, §4.1).
//!
//! [`Store`] is intentionally synchronous and object-safe, following the
//! `BlobStore`/`MemoryTier` split used elsewhere in this workspace: a single
//! trait describing the persistence contract, with [`memory::InMemoryStore`]
//! as the reference implementation. Every method is atomic from the caller's
//! perspective — callers never observe a partially-applied write.

pub mod memory;

pub use memory::InMemoryStore;

use voidsync_types::{
    Agent, Change, ChangeFilter, ChangeId, ChangeStatus, Fingerprint, Lock, LockId,
    RateLimitCounter, VoidSyncError,
};

/// A patch applied to a [`Change`] via [`Store::update_change`].
///
/// Only `status` is transition-checked; `metadata` is a full replacement when
/// present, matching how the teacher's config layer treats a save as a whole
/// blob rather than a merge.
#[derive(Debug, Clone, Default)]
pub struct ChangePatch {
    /// New status, checked against [`ChangeStatus::can_transition_to`].
    pub status: Option<ChangeStatus>,
    /// Replacement metadata, if any.
    pub metadata: Option<voidsync_types::ChangeMetadata>,
}

/// Repository for agents, changes, locks, rate-limit counters, and
/// fingerprints.
///
/// Errors: `NotFound`, `Conflict` is surfaced as
/// [`VoidSyncError::InvalidInput`] (unique-constraint violation on a lock
/// path or agent identity) since the taxonomy in §7 has no dedicated
/// `Conflict` variant for the Store layer — agent/lock conflicts are a form
/// of caller-supplied invalid input (double registration, double lock), and
/// `InvalidTransition` covers the one genuinely special conflict case (a
/// `Change`'s status).
pub trait Store: Send + Sync {
    /// Create or overwrite an agent record. Returns the stored agent.
    fn upsert_agent(&self, agent: Agent) -> Result<Agent, VoidSyncError>;
    /// Look up an agent by identity.
    fn get_agent(&self, identity: &str) -> Result<Option<Agent>, VoidSyncError>;

    /// Create a change record; the Store assigns the id.
    fn create_change(&self, change: NewChange) -> Result<Change, VoidSyncError>;
    /// Look up a change by id.
    fn get_change(&self, id: ChangeId) -> Result<Option<Change>, VoidSyncError>;
    /// Apply a patch to a change. Rejects transitions that are not among the
    /// two allowed (`pending -> approved`, `pending -> rejected`) with
    /// [`VoidSyncError::InvalidTransition`]. Always bumps `updated_at`.
    fn update_change(&self, id: ChangeId, patch: ChangePatch) -> Result<Change, VoidSyncError>;
    /// List changes matching `filter`, newest-first by id.
    fn list_changes(&self, filter: &ChangeFilter) -> Result<Vec<Change>, VoidSyncError>;

    /// Create a lock. Fails with `InvalidInput` if `path` is already locked.
    fn create_lock(&self, path: String, pattern: Option<String>) -> Result<Lock, VoidSyncError>;
    /// Delete a lock by id. Returns `false` if it did not exist.
    fn delete_lock(&self, id: LockId) -> Result<bool, VoidSyncError>;
    /// All locks currently registered.
    fn list_locks(&self) -> Result<Vec<Lock>, VoidSyncError>;

    /// Fetch the rate-limit counter for an agent, if one has ever been
    /// observed.
    fn get_rate_limit_counter(&self, agent_id: &str) -> Result<Option<RateLimitCounter>, VoidSyncError>;
    /// Persist the rate-limit counter for an agent (full replacement).
    fn put_rate_limit_counter(&self, counter: RateLimitCounter) -> Result<(), VoidSyncError>;

    /// Fetch the fingerprint recorded for a path, if any.
    fn get_fingerprint(&self, path: &str) -> Result<Option<Fingerprint>, VoidSyncError>;
    /// Persist the fingerprint for a path (full replacement).
    fn put_fingerprint(&self, fingerprint: Fingerprint) -> Result<(), VoidSyncError>;
}

/// Input to [`Store::create_change`]; the Store assigns `id`, `status`,
/// `created_at`, and `updated_at`.
#[derive(Debug, Clone)]
pub struct NewChange {
    /// Identity of the submitting agent.
    pub agent_id: String,
    /// Workspace-relative target path.
    pub path: String,
    /// Unified diff text.
    pub diff: String,
    /// Original content captured at submission time.
    pub original_content: String,
    /// Submitter-supplied metadata.
    pub metadata: voidsync_types::ChangeMetadata,
}
