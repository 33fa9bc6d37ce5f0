// SPDX-License-Identifier: Apache-2.0
//! The submit/approve/reject state machine and the two-phase sandbox to
//! production commit — the heart of the pipeline (§4.8).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};
use voidsync_agents::AgentRegistry;
use voidsync_diff::{apply_diff, create_diff, DEFAULT_CONTEXT_LINES};
use voidsync_events::EventBus;
use voidsync_fingerprint::{hash, Fingerprinter};
use voidsync_locks::LockRegistry;
use voidsync_plugins::{Pipeline, PluginContext, Stage};
use voidsync_push_proto::ServerMessage;
use voidsync_ratelimit::RateLimiter;
use voidsync_store::{ChangePatch, NewChange, Store};
use voidsync_types::{
    normalize_path, Change, ChangeFilter, ChangeId, ChangeIdDisplay, ChangeMetadata, ChangePage,
    ChangeStatus, VoidSyncError,
};

use crate::sandbox;

/// The channel `ChangesUpdated`/`ChangeStatus` events are published on.
pub const CHANGES_CHANNEL: &str = "changes";

/// Per-path async mutexes, so approvals on the same path serialize while
/// approvals on different paths proceed independently (§4.8, §5).
#[derive(Default)]
struct PathLocks {
    inner: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PathLocks {
    fn get(&self, path: &str) -> Arc<AsyncMutex<()>> {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

/// Constructor parameters for [`ChangeManager`], gathered so call sites
/// don't thread nine positional arguments.
pub struct ChangeManagerConfig<'a> {
    /// Backing repository.
    pub store: &'a dyn Store,
    /// Validator/processor pipeline.
    pub pipeline: &'a Pipeline,
    /// Push-channel fan-out.
    pub events: &'a EventBus,
    /// Authoritative production tree.
    pub workspace_root: PathBuf,
    /// Staging tree mirroring in-flight approvals.
    pub sandbox_root: PathBuf,
    /// Context lines for generated diffs.
    pub diff_context_lines: usize,
    /// Rate limiter fixed-window size.
    pub rate_limit_window: Duration,
    /// Rate limiter requests-per-window cap.
    pub rate_limit_max: u32,
    /// Largest content a single submission may carry, in bytes.
    pub max_file_size: u64,
}

/// Owns the submit/approve/reject/list operations and the per-path
/// serialization that guards concurrent approvals (§4.8, §5).
pub struct ChangeManager<'a> {
    store: &'a dyn Store,
    rate_limiter: RateLimiter<'a>,
    locks: LockRegistry<'a>,
    fingerprinter: Fingerprinter<'a>,
    pipeline: &'a Pipeline,
    events: &'a EventBus,
    workspace_root: PathBuf,
    sandbox_root: PathBuf,
    diff_context_lines: usize,
    max_file_size: u64,
    path_locks: PathLocks,
}

impl<'a> ChangeManager<'a> {
    /// Build a change manager from `config`.
    #[must_use]
    pub fn new(config: ChangeManagerConfig<'a>) -> Self {
        Self {
            store: config.store,
            rate_limiter: RateLimiter::new(config.store, config.rate_limit_window, config.rate_limit_max),
            locks: LockRegistry::new(config.store),
            fingerprinter: Fingerprinter::new(config.store),
            pipeline: config.pipeline,
            events: config.events,
            workspace_root: config.workspace_root,
            sandbox_root: config.sandbox_root,
            diff_context_lines: if config.diff_context_lines == 0 {
                DEFAULT_CONTEXT_LINES
            } else {
                config.diff_context_lines
            },
            max_file_size: config.max_file_size,
            path_locks: PathLocks::default(),
        }
    }

    /// `submit(agentId, path, newContent)` (§4.8): runs the ordered
    /// preconditions — including the `maxFileSize` length check ahead of the
    /// `PreSync` plugin run — then records a pending change from the diff of
    /// the (possibly plugin-mutated) content against current production.
    pub async fn submit(
        &self,
        agent_id: &str,
        path: &str,
        new_content: &str,
    ) -> Result<ChangeId, VoidSyncError> {
        let normalized = normalize_path(path)?;

        let agent = self
            .store
            .get_agent(agent_id)?
            .ok_or_else(|| VoidSyncError::AgentUnknown(agent_id.to_string()))?;
        if agent.status != voidsync_types::AgentStatus::Active {
            return Err(VoidSyncError::AgentInactive(agent_id.to_string()));
        }

        self.rate_limiter.track(agent_id)?;
        if self.rate_limiter.is_limited(agent_id)? {
            return Err(VoidSyncError::RateLimited(agent_id.to_string()));
        }

        if !AgentRegistry::can_edit(&agent, &normalized) {
            return Err(VoidSyncError::Forbidden {
                agent: agent_id.to_string(),
                path: normalized,
            });
        }

        if self.locks.check(&normalized, Some(new_content))?.is_some() {
            return Err(VoidSyncError::Locked(normalized));
        }

        if new_content.len() as u64 > self.max_file_size {
            return Err(VoidSyncError::InvalidInput(format!(
                "content length {} exceeds max_file_size {}",
                new_content.len(),
                self.max_file_size
            )));
        }

        let original = sandbox::read_production(&self.workspace_root, &normalized).await?;

        let context = PluginContext {
            path: normalized.clone(),
            content: new_content.to_string(),
            original_content: Some(original.clone()),
            metadata: HashMap::new(),
            stage: Stage::PreSync,
            agent_id: agent_id.to_string(),
        };
        let report = self.pipeline.run(Stage::PreSync, &normalized, context).await?;

        let diff = create_diff(&normalized, &original, &report.content, self.diff_context_lines);
        let submitted_fingerprint = Some(hash(original.as_bytes()));

        let change = self.store.create_change(NewChange {
            agent_id: agent_id.to_string(),
            path: normalized,
            diff,
            original_content: original,
            metadata: ChangeMetadata {
                plugin_warnings: report.warnings,
                submitted_fingerprint,
                ..ChangeMetadata::default()
            },
        })?;

        info!(change_id = change.id, agent_id, "change submitted");
        self.events.publish(
            CHANGES_CHANNEL,
            ServerMessage::ChangesUpdated {
                changes: vec![change.clone()],
            },
        );

        Ok(change.id)
    }

    /// `approve(changeId, approvedBy)` (§4.8): stage into sandbox, run the
    /// `DuringSync` pipeline, then commit to production.
    pub async fn approve(&self, change_id: ChangeId, approved_by: &str) -> Result<Change, VoidSyncError> {
        let change = self.load_pending(change_id)?;

        let path_lock = self.path_locks.get(&change.path);
        let _guard = path_lock.lock().await;

        let current_production = sandbox::read_production(&self.workspace_root, &change.path).await?;
        let current_fingerprint = hash(current_production.as_bytes());
        if change.metadata.submitted_fingerprint.as_deref() != Some(current_fingerprint.as_str()) {
            warn!(change_id, path = %change.path, "drift detected at approval time");
            return Err(VoidSyncError::Drifted(change.path.clone()));
        }

        let staged_base = sandbox::read_staged_or(&self.sandbox_root, &change.path, &current_production).await?;
        let Ok(applied) = apply_diff(&change.diff, &staged_base) else {
            return Err(VoidSyncError::Drifted(change.path.clone()));
        };

        if let Err(err) = sandbox::write_staged(&self.sandbox_root, &change.path, &applied).await {
            return self.reject_from_approval_failure(&change, &err.to_string()).await.and(Err(err));
        }

        let context = PluginContext {
            path: change.path.clone(),
            content: applied.clone(),
            original_content: Some(staged_base),
            metadata: HashMap::new(),
            stage: Stage::DuringSync,
            agent_id: change.agent_id.clone(),
        };
        let report = match self.pipeline.run(Stage::DuringSync, &change.path, context).await {
            Ok(report) => report,
            Err(err) => {
                sandbox::rollback(&self.sandbox_root, &change.path).await?;
                self.reject_from_approval_failure(&change, &err.to_string()).await?;
                return Err(err);
            }
        };

        if report.content != applied {
            if let Err(err) = sandbox::write_staged(&self.sandbox_root, &change.path, &report.content).await {
                return self.reject_from_approval_failure(&change, &err.to_string()).await.and(Err(err));
            }
        }

        let committed_bytes = match sandbox::commit_to_production(&self.sandbox_root, &self.workspace_root, &change.path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                self.reject_from_approval_failure(&change, &err.to_string()).await?;
                return Err(err);
            }
        };
        self.fingerprinter.save(&change.path, hash(&committed_bytes))?;

        let updated = self.store.update_change(
            change_id,
            ChangePatch {
                status: Some(ChangeStatus::Approved),
                metadata: Some(ChangeMetadata {
                    approved_by: Some(approved_by.to_string()),
                    ..change.metadata.clone()
                }),
            },
        )?;

        info!(change_id, path = %change.path, "change approved");
        self.events.publish(
            CHANGES_CHANNEL,
            ServerMessage::ChangeStatus {
                change_id,
                status: ChangeStatus::Approved,
            },
        );
        self.events.publish(
            CHANGES_CHANNEL,
            ServerMessage::ChangesUpdated {
                changes: vec![updated.clone()],
            },
        );

        Ok(updated)
    }

    /// `reject(changeId, reason)` (§4.8): no filesystem mutation.
    pub fn reject(&self, change_id: ChangeId, reason: Option<String>) -> Result<Change, VoidSyncError> {
        let change = self.load_pending(change_id)?;
        let updated = self.store.update_change(
            change_id,
            ChangePatch {
                status: Some(ChangeStatus::Rejected),
                metadata: Some(ChangeMetadata {
                    reason,
                    ..change.metadata.clone()
                }),
            },
        )?;

        self.events.publish(
            CHANGES_CHANNEL,
            ServerMessage::ChangeStatus {
                change_id,
                status: ChangeStatus::Rejected,
            },
        );
        self.events.publish(
            CHANGES_CHANNEL,
            ServerMessage::ChangesUpdated {
                changes: vec![updated.clone()],
            },
        );

        Ok(updated)
    }

    /// `list(filter)` (§4.8): pass-through to the Store.
    pub fn list(&self, filter: &ChangeFilter) -> Result<ChangePage, VoidSyncError> {
        let changes = self.store.list_changes(filter)?;
        let total = self.store.list_changes(&ChangeFilter {
            offset: 0,
            limit: None,
            ..filter.clone()
        })?
        .len();
        Ok(ChangePage {
            changes,
            total,
            offset: filter.offset,
        })
    }

    fn load_pending(&self, change_id: ChangeId) -> Result<Change, VoidSyncError> {
        let change = self
            .store
            .get_change(change_id)?
            .ok_or_else(|| VoidSyncError::NotFound(format!("change {change_id}")))?;
        if change.status != ChangeStatus::Pending {
            return Err(VoidSyncError::InvalidTransition(ChangeIdDisplay(change_id)));
        }
        Ok(change)
    }

    /// Roll back the sandbox write and mark `change` rejected with `cause`
    /// recorded in its metadata (§4.9 failure semantics).
    async fn reject_from_approval_failure(&self, change: &Change, cause: &str) -> Result<(), VoidSyncError> {
        sandbox::rollback(&self.sandbox_root, &change.path).await?;
        let updated = self.store.update_change(
            change.id,
            ChangePatch {
                status: Some(ChangeStatus::Rejected),
                metadata: Some(ChangeMetadata {
                    failure_cause: Some(cause.to_string()),
                    ..change.metadata.clone()
                }),
            },
        )?;
        self.events.publish(
            CHANGES_CHANNEL,
            ServerMessage::ChangeStatus {
                change_id: change.id,
                status: ChangeStatus::Rejected,
            },
        );
        self.events.publish(
            CHANGES_CHANNEL,
            ServerMessage::ChangesUpdated {
                changes: vec![updated],
            },
        );
        Ok(())
    }
}
