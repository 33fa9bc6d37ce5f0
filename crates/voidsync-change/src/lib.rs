// SPDX-License-Identifier: Apache-2.0
//! The submit/approve/reject/list state machine: sandbox staging, drift
//! detection, and plugin-pipeline integration around a [`voidsync_store::Store`]
//! (§4.8).

pub mod manager;
pub mod sandbox;

pub use manager::{ChangeManager, ChangeManagerConfig, CHANGES_CHANNEL};

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::Duration;
    use voidsync_agents::{AgentConfig, AgentRegistry};
    use voidsync_events::EventBus;
    use voidsync_plugins::{Pipeline, Plugin, PluginContext, PluginOutcome, Stage};
    use voidsync_store::{InMemoryStore, Store};
    use voidsync_types::{AgentKind, AgentMetadata, ChangeFilter, ChangeStatus, VoidSyncError};

    use super::*;

    fn register_agent(store: &InMemoryStore, identity: &str) {
        AgentRegistry::new(store)
            .register(AgentConfig {
                identity: identity.to_string(),
                display_name: identity.to_string(),
                kind: AgentKind::Editor,
                metadata: AgentMetadata::default(),
            })
            .unwrap();
    }

    fn manager<'a>(
        store: &'a InMemoryStore,
        pipeline: &'a Pipeline,
        events: &'a EventBus,
        root: &tempfile::TempDir,
        sandbox: &tempfile::TempDir,
    ) -> ChangeManager<'a> {
        ChangeManager::new(ChangeManagerConfig {
            store,
            pipeline,
            events,
            workspace_root: root.path().to_path_buf(),
            sandbox_root: sandbox.path().to_path_buf(),
            diff_context_lines: 3,
            rate_limit_window: Duration::minutes(60),
            rate_limit_max: 1000,
            max_file_size: 5 * 1024 * 1024,
        })
    }

    #[tokio::test]
    async fn submit_then_approve_writes_production_and_fingerprint() {
        let store = InMemoryStore::new();
        register_agent(&store, "agent-1");
        let pipeline = Pipeline::new();
        let events = EventBus::new();
        let workspace = tempfile::tempdir().unwrap();
        let sandbox = tempfile::tempdir().unwrap();
        let mgr = manager(&store, &pipeline, &events, &workspace, &sandbox);

        let change_id = mgr.submit("agent-1", "notes.txt", "hello\n").await.unwrap();
        let approved = mgr.approve(change_id, "operator-1").await.unwrap();

        assert_eq!(approved.status, ChangeStatus::Approved);
        let on_disk = tokio::fs::read_to_string(workspace.path().join("notes.txt"))
            .await
            .unwrap();
        assert_eq!(on_disk, "hello\n");
    }

    #[tokio::test]
    async fn approve_fails_with_drifted_when_production_changed_after_submit() {
        let store = InMemoryStore::new();
        register_agent(&store, "agent-1");
        let pipeline = Pipeline::new();
        let events = EventBus::new();
        let workspace = tempfile::tempdir().unwrap();
        let sandbox = tempfile::tempdir().unwrap();
        let mgr = manager(&store, &pipeline, &events, &workspace, &sandbox);

        let change_id = mgr.submit("agent-1", "notes.txt", "hello\n").await.unwrap();
        tokio::fs::write(workspace.path().join("notes.txt"), "someone else wrote this\n")
            .await
            .unwrap();

        let result = mgr.approve(change_id, "operator-1").await;
        assert!(matches!(result, Err(VoidSyncError::Drifted(_))));

        let still_pending = store.get_change(change_id).unwrap().unwrap();
        assert_eq!(still_pending.status, ChangeStatus::Pending);
    }

    #[tokio::test]
    async fn reject_leaves_production_untouched() {
        let store = InMemoryStore::new();
        register_agent(&store, "agent-1");
        let pipeline = Pipeline::new();
        let events = EventBus::new();
        let workspace = tempfile::tempdir().unwrap();
        let sandbox = tempfile::tempdir().unwrap();
        let mgr = manager(&store, &pipeline, &events, &workspace, &sandbox);

        let change_id = mgr.submit("agent-1", "notes.txt", "hello\n").await.unwrap();
        let rejected = mgr.reject(change_id, Some("not needed".into())).unwrap();

        assert_eq!(rejected.status, ChangeStatus::Rejected);
        assert!(!workspace.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn submit_rejects_inactive_agent() {
        let store = InMemoryStore::new();
        register_agent(&store, "agent-1");
        let agent = store.get_agent("agent-1").unwrap().unwrap();
        store
            .upsert_agent(voidsync_types::Agent {
                status: voidsync_types::AgentStatus::Inactive,
                ..agent
            })
            .unwrap();
        let pipeline = Pipeline::new();
        let events = EventBus::new();
        let workspace = tempfile::tempdir().unwrap();
        let sandbox = tempfile::tempdir().unwrap();
        let mgr = manager(&store, &pipeline, &events, &workspace, &sandbox);

        let result = mgr.submit("agent-1", "notes.txt", "hello\n").await;
        assert!(matches!(result, Err(VoidSyncError::AgentInactive(_))));
    }

    #[tokio::test]
    async fn submit_rejects_content_over_max_file_size() {
        let store = InMemoryStore::new();
        register_agent(&store, "agent-1");
        let pipeline = Pipeline::new();
        let events = EventBus::new();
        let workspace = tempfile::tempdir().unwrap();
        let sandbox = tempfile::tempdir().unwrap();
        let mgr = ChangeManager::new(ChangeManagerConfig {
            store: &store,
            pipeline: &pipeline,
            events: &events,
            workspace_root: workspace.path().to_path_buf(),
            sandbox_root: sandbox.path().to_path_buf(),
            diff_context_lines: 3,
            rate_limit_window: Duration::minutes(60),
            rate_limit_max: 1000,
            max_file_size: 4,
        });

        let result = mgr.submit("agent-1", "notes.txt", "hello\n").await;
        assert!(matches!(result, Err(VoidSyncError::InvalidInput(_))));
        let pending = store
            .list_changes(&ChangeFilter::default())
            .unwrap();
        assert!(pending.is_empty());
    }

    struct FailingValidator;

    impl Plugin for FailingValidator {
        fn id(&self) -> &str {
            "always-fails"
        }
        fn kind(&self) -> voidsync_plugins::PluginKind {
            voidsync_plugins::PluginKind::Validator
        }
        fn stages(&self) -> &[Stage] {
            &[Stage::DuringSync]
        }
        fn patterns(&self) -> &[regex::Regex] {
            &[]
        }
        fn execute(&self, _context: &PluginContext) -> PluginOutcome {
            PluginOutcome::fail("rejected for testing")
        }
    }

    #[tokio::test]
    async fn approve_rolls_back_and_rejects_on_plugin_failure() {
        let store = InMemoryStore::new();
        register_agent(&store, "agent-1");
        let mut pipeline = Pipeline::new();
        pipeline.register(std::sync::Arc::new(FailingValidator));
        let events = EventBus::new();
        let workspace = tempfile::tempdir().unwrap();
        let sandbox = tempfile::tempdir().unwrap();
        let mgr = manager(&store, &pipeline, &events, &workspace, &sandbox);

        let change_id = mgr.submit("agent-1", "notes.txt", "hello\n").await.unwrap();
        let result = mgr.approve(change_id, "operator-1").await;

        assert!(matches!(result, Err(VoidSyncError::PluginRejected(_))));
        let final_change = store.get_change(change_id).unwrap().unwrap();
        assert_eq!(final_change.status, ChangeStatus::Rejected);
        assert!(final_change.metadata.failure_cause.is_some());
        assert!(!sandbox.path().join("notes.txt").exists());
        assert!(!workspace.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn list_passes_filter_through_to_store() {
        let store = InMemoryStore::new();
        register_agent(&store, "agent-1");
        let pipeline = Pipeline::new();
        let events = EventBus::new();
        let workspace = tempfile::tempdir().unwrap();
        let sandbox = tempfile::tempdir().unwrap();
        let mgr = manager(&store, &pipeline, &events, &workspace, &sandbox);

        mgr.submit("agent-1", "a.txt", "a\n").await.unwrap();
        mgr.submit("agent-1", "b.txt", "b\n").await.unwrap();

        let filter = ChangeFilter {
            status: Some(ChangeStatus::Pending),
            ..ChangeFilter::default()
        };
        let pending = mgr.list(&filter).unwrap();
        assert_eq!(pending.changes.len(), 2);
        assert_eq!(pending.total, 2);
    }
}
