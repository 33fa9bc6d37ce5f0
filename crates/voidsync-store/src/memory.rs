// SPDX-License-Identifier: Apache-2.0
//! In-memory [`Store`] implementation.
//!
//! Sufficient for the reference service and for tests. A durable backend
//! (sqlite/postgres) can implement the same [`Store`] trait without any
//! caller-visible change — same split as `echo-cas`'s `MemoryTier` versus its
//! future disk tier.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use voidsync_types::{
    Agent, Change, ChangeFilter, ChangeId, ChangeStatus, Fingerprint, Lock, LockId,
    RateLimitCounter, VoidSyncError,
};

use crate::{ChangePatch, NewChange, Store};

#[derive(Default)]
struct Inner {
    agents: HashMap<String, Agent>,
    changes: HashMap<ChangeId, Change>,
    next_change_id: ChangeId,
    locks: HashMap<LockId, Lock>,
    next_lock_id: LockId,
    rate_limits: HashMap<String, RateLimitCounter>,
    fingerprints: HashMap<String, Fingerprint>,
}

/// A `Mutex`-guarded, process-local [`Store`].
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned mutex means a prior writer panicked mid-mutation; there is
        // no safe recovery, so surface it the same way the stdlib would.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Store for InMemoryStore {
    fn upsert_agent(&self, agent: Agent) -> Result<Agent, VoidSyncError> {
        let mut inner = self.lock();
        inner.agents.insert(agent.identity.clone(), agent.clone());
        Ok(agent)
    }

    fn get_agent(&self, identity: &str) -> Result<Option<Agent>, VoidSyncError> {
        Ok(self.lock().agents.get(identity).cloned())
    }

    fn create_change(&self, change: NewChange) -> Result<Change, VoidSyncError> {
        let mut inner = self.lock();
        let id = inner.next_change_id;
        inner.next_change_id += 1;
        let now = Utc::now();
        let record = Change {
            id,
            agent_id: change.agent_id,
            path: change.path,
            diff: change.diff,
            original_content: change.original_content,
            status: ChangeStatus::Pending,
            metadata: change.metadata,
            created_at: now,
            updated_at: now,
        };
        inner.changes.insert(id, record.clone());
        Ok(record)
    }

    fn get_change(&self, id: ChangeId) -> Result<Option<Change>, VoidSyncError> {
        Ok(self.lock().changes.get(&id).cloned())
    }

    fn update_change(&self, id: ChangeId, patch: ChangePatch) -> Result<Change, VoidSyncError> {
        let mut inner = self.lock();
        let record = inner
            .changes
            .get_mut(&id)
            .ok_or_else(|| VoidSyncError::NotFound(format!("change {id}")))?;

        if let Some(next) = patch.status {
            if !record.status.can_transition_to(next) {
                return Err(VoidSyncError::InvalidTransition(
                    voidsync_types::ChangeIdDisplay(id),
                ));
            }
            record.status = next;
        }
        if let Some(metadata) = patch.metadata {
            record.metadata = metadata;
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    fn list_changes(&self, filter: &ChangeFilter) -> Result<Vec<Change>, VoidSyncError> {
        let inner = self.lock();
        let mut matches: Vec<Change> = inner
            .changes
            .values()
            .filter(|c| filter.status.is_none_or(|s| c.status == s))
            .filter(|c| {
                filter
                    .agent_id
                    .as_deref()
                    .is_none_or(|a| c.agent_id == a)
            })
            .filter(|c| filter.submitted_after.is_none_or(|after| c.created_at >= after))
            .filter(|c| filter.submitted_before.is_none_or(|before| c.created_at <= before))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.id.cmp(&a.id));

        let paged = matches.into_iter().skip(filter.offset);
        Ok(match filter.limit {
            Some(limit) => paged.take(limit).collect(),
            None => paged.collect(),
        })
    }

    fn create_lock(&self, path: String, pattern: Option<String>) -> Result<Lock, VoidSyncError> {
        let mut inner = self.lock();
        if inner.locks.values().any(|l| l.path == path) {
            return Err(VoidSyncError::InvalidInput(format!(
                "path {path} is already locked"
            )));
        }
        let id = inner.next_lock_id;
        inner.next_lock_id += 1;
        let record = Lock { id, path, pattern };
        inner.locks.insert(id, record.clone());
        Ok(record)
    }

    fn delete_lock(&self, id: LockId) -> Result<bool, VoidSyncError> {
        Ok(self.lock().locks.remove(&id).is_some())
    }

    fn list_locks(&self) -> Result<Vec<Lock>, VoidSyncError> {
        Ok(self.lock().locks.values().cloned().collect())
    }

    fn get_rate_limit_counter(
        &self,
        agent_id: &str,
    ) -> Result<Option<RateLimitCounter>, VoidSyncError> {
        Ok(self.lock().rate_limits.get(agent_id).cloned())
    }

    fn put_rate_limit_counter(&self, counter: RateLimitCounter) -> Result<(), VoidSyncError> {
        self.lock()
            .rate_limits
            .insert(counter.agent_id.clone(), counter);
        Ok(())
    }

    fn get_fingerprint(&self, path: &str) -> Result<Option<Fingerprint>, VoidSyncError> {
        Ok(self.lock().fingerprints.get(path).cloned())
    }

    fn put_fingerprint(&self, fingerprint: Fingerprint) -> Result<(), VoidSyncError> {
        self.lock()
            .fingerprints
            .insert(fingerprint.path.clone(), fingerprint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use voidsync_types::{AgentKind, ChangeMetadata};

    fn sample_agent(identity: &str) -> Agent {
        Agent::new(identity, identity, AgentKind::Editor)
    }

    #[test]
    fn change_id_is_monotonic() {
        let store = InMemoryStore::new();
        let a = store
            .create_change(NewChange {
                agent_id: "a".into(),
                path: "a.js".into(),
                diff: String::new(),
                original_content: String::new(),
                metadata: ChangeMetadata::default(),
            })
            .unwrap();
        let b = store
            .create_change(NewChange {
                agent_id: "a".into(),
                path: "b.js".into(),
                diff: String::new(),
                original_content: String::new(),
                metadata: ChangeMetadata::default(),
            })
            .unwrap();
        assert_eq!(b.id, a.id + 1);
    }

    #[test]
    fn only_pending_to_approved_or_rejected_is_legal() {
        let store = InMemoryStore::new();
        let change = store
            .create_change(NewChange {
                agent_id: "a".into(),
                path: "a.js".into(),
                diff: String::new(),
                original_content: String::new(),
                metadata: ChangeMetadata::default(),
            })
            .unwrap();

        let approved = store
            .update_change(
                change.id,
                ChangePatch {
                    status: Some(ChangeStatus::Approved),
                    metadata: None,
                },
            )
            .unwrap();
        assert_eq!(approved.status, ChangeStatus::Approved);

        let err = store
            .update_change(
                change.id,
                ChangePatch {
                    status: Some(ChangeStatus::Rejected),
                    metadata: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, VoidSyncError::InvalidTransition(_)));
    }

    #[test]
    fn duplicate_lock_path_is_rejected() {
        let store = InMemoryStore::new();
        store.create_lock("a.js".into(), None).unwrap();
        assert!(store.create_lock("a.js".into(), None).is_err());
    }

    #[test]
    fn list_changes_filters_by_status_and_agent() {
        let store = InMemoryStore::new();
        store.upsert_agent(sample_agent("gpt")).unwrap();
        let c1 = store
            .create_change(NewChange {
                agent_id: "gpt".into(),
                path: "a.js".into(),
                diff: String::new(),
                original_content: String::new(),
                metadata: ChangeMetadata::default(),
            })
            .unwrap();
        store
            .create_change(NewChange {
                agent_id: "other".into(),
                path: "b.js".into(),
                diff: String::new(),
                original_content: String::new(),
                metadata: ChangeMetadata::default(),
            })
            .unwrap();
        store
            .update_change(
                c1.id,
                ChangePatch {
                    status: Some(ChangeStatus::Approved),
                    metadata: None,
                },
            )
            .unwrap();

        let pending = store
            .list_changes(&ChangeFilter {
                status: Some(ChangeStatus::Pending),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].agent_id, "other");

        let by_agent = store
            .list_changes(&ChangeFilter {
                agent_id: Some("gpt".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_agent.len(), 1);
        assert_eq!(by_agent[0].id, c1.id);
    }
}
