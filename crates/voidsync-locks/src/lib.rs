// SPDX-License-Identifier: Apache-2.0
//! Path and content-pattern lock registry — the "is this path writable?"
//! oracle (§4.4).
//!
//! Resolved semantics (§9 open question): a lock with no `pattern` forbids
//! *all* edits to its exact path. A lock *with* a `pattern` forbids edits
//! whose **proposed new content** matches that regex; pattern locks never
//! match on path. Implementations wanting a path-pattern lock kind would add
//! a second, explicit variant rather than overloading this one.

use regex::Regex;
use tracing::warn;
use voidsync_store::Store;
use voidsync_types::{normalize_path, Lock, LockId, VoidSyncError};

/// The lock registry, backed by a [`Store`].
pub struct LockRegistry<'a> {
    store: &'a dyn Store,
}

impl<'a> LockRegistry<'a> {
    /// Build a registry over `store`.
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// The first lock that denies writing `proposed_content` to `path`, if
    /// any: a direct-path lock on the normalized path, else the first
    /// pattern lock whose regex matches `proposed_content`.
    pub fn check(
        &self,
        path: &str,
        proposed_content: Option<&str>,
    ) -> Result<Option<Lock>, VoidSyncError> {
        let normalized = normalize_path(path)?;
        let locks = self.store.list_locks()?;

        if let Some(direct) = locks
            .iter()
            .find(|l| l.pattern.is_none() && l.path == normalized)
        {
            return Ok(Some(direct.clone()));
        }

        let Some(content) = proposed_content else {
            return Ok(None);
        };

        for lock in locks.iter().filter(|l| l.pattern.is_some()) {
            // Safety net: a pattern lock with content that somehow fails to
            // compile (e.g. corrupted at rest) is skipped rather than
            // treated as a universal lock.
            let Some(pattern) = &lock.pattern else {
                continue;
            };
            match Regex::new(pattern) {
                Ok(re) if re.is_match(content) => return Ok(Some(lock.clone())),
                Ok(_) => {}
                Err(err) => warn!(lock_id = lock.id, %err, "skipping lock with invalid pattern"),
            }
        }

        Ok(None)
    }

    /// Create a lock on `path`, optionally restricted to content matching
    /// `pattern`. Fails with [`VoidSyncError::InvalidInput`] if `pattern` is
    /// not a valid regex, or if `path` is already locked.
    pub fn create_lock(&self, path: &str, pattern: Option<String>) -> Result<Lock, VoidSyncError> {
        let normalized = normalize_path(path)?;
        if let Some(p) = &pattern {
            Regex::new(p).map_err(|e| VoidSyncError::InvalidInput(format!("bad pattern: {e}")))?;
        }
        self.store.create_lock(normalized, pattern)
    }

    /// Release a lock by id. Returns `false` if it did not exist.
    pub fn release_lock(&self, id: LockId) -> Result<bool, VoidSyncError> {
        self.store.delete_lock(id)
    }

    /// All locks currently registered.
    pub fn list(&self) -> Result<Vec<Lock>, VoidSyncError> {
        self.store.list_locks()
    }
}
