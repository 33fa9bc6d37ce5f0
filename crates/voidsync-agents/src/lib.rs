// SPDX-License-Identifier: Apache-2.0
//! Agent identity, status, and the `canEdit` policy predicate (§4.7).
//!
//! Resolved semantics (§9 open question): `metadata.can_edit` entries are
//! always compiled as regex. A shell-glob-looking entry (e.g. `"*.js"`) is
//! not auto-translated — it is skipped and logged, the same treatment given
//! to an entry that fails to compile at all. Configurations wanting glob
//! semantics must express them as the equivalent regex.

use regex::Regex;
use tracing::warn;
use voidsync_store::Store;
use voidsync_types::{Agent, AgentKind, AgentMetadata, AgentStatus, VoidSyncError};

/// Input to [`AgentRegistry::register`]. Fully describes the agent except
/// its lifecycle `status`, which `register` preserves across re-registration
/// rather than resetting — status is owned by operator-level admin calls.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Stable, human-readable identity.
    pub identity: String,
    /// Display name shown to operators.
    pub display_name: String,
    /// Coarse agent kind.
    pub kind: AgentKind,
    /// Permission policy and soft limits.
    pub metadata: AgentMetadata,
}

/// Agent identity and policy, backed by a [`Store`].
pub struct AgentRegistry<'a> {
    store: &'a dyn Store,
}

impl<'a> AgentRegistry<'a> {
    /// Build a registry over `store`.
    #[must_use]
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Create `config`'s agent on first sight, or update its display name,
    /// kind, and metadata otherwise. Idempotent: registering the same
    /// config twice yields the same identity and no duplicate record (P8).
    pub fn register(&self, config: AgentConfig) -> Result<Agent, VoidSyncError> {
        let status = self
            .store
            .get_agent(&config.identity)?
            .map_or(AgentStatus::Active, |existing| existing.status);

        let agent = Agent {
            identity: config.identity,
            display_name: config.display_name,
            kind: config.kind,
            status,
            metadata: config.metadata,
        };
        self.store.upsert_agent(agent)
    }

    /// Look up an agent by identity.
    pub fn by_identity(&self, identity: &str) -> Result<Option<Agent>, VoidSyncError> {
        self.store.get_agent(identity)
    }

    /// Whether `agent` may submit a change to `path`: `agent` must be
    /// `active`, and either its `can_edit` list is empty (unrestricted) or
    /// some entry, compiled as a regex, matches `path`. Invalid regex
    /// entries are skipped and logged rather than rejecting the whole
    /// policy.
    #[must_use]
    pub fn can_edit(agent: &Agent, path: &str) -> bool {
        if agent.status != AgentStatus::Active {
            return false;
        }
        if agent.metadata.can_edit.is_empty() {
            return true;
        }
        agent.metadata.can_edit.iter().any(|entry| {
            match Regex::new(entry) {
                Ok(re) => re.is_match(path),
                Err(err) => {
                    warn!(agent = %agent.identity, pattern = %entry, %err, "skipping invalid canEdit pattern");
                    false
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use proptest::prelude::*;
    use voidsync_store::InMemoryStore;

    fn config(identity: &str) -> AgentConfig {
        AgentConfig {
            identity: identity.to_string(),
            display_name: "GPT-4".to_string(),
            kind: AgentKind::Editor,
            metadata: AgentMetadata {
                can_edit: vec![r".*\.js$".to_string()],
                can_comment: false,
                max_changes_per_day: Some(10),
            },
        }
    }

    #[test]
    fn register_is_idempotent() {
        let store = InMemoryStore::new();
        let registry = AgentRegistry::new(&store);
        let first = registry.register(config("GPT-4")).unwrap();
        let second = registry.register(config("GPT-4")).unwrap();
        assert_eq!(first.identity, second.identity);
        assert_eq!(registry.by_identity("GPT-4").unwrap().unwrap().identity, "GPT-4");
    }

    #[test]
    fn register_preserves_status_set_by_admin() {
        let store = InMemoryStore::new();
        let registry = AgentRegistry::new(&store);
        let mut agent = registry.register(config("GPT-4")).unwrap();
        agent.status = AgentStatus::Inactive;
        store.upsert_agent(agent).unwrap();

        let reregistered = registry.register(config("GPT-4")).unwrap();
        assert_eq!(reregistered.status, AgentStatus::Inactive);
    }

    #[test]
    fn can_edit_denies_inactive_agent() {
        let mut agent = Agent::new("GPT-4", "GPT-4", AgentKind::Editor);
        agent.status = AgentStatus::Inactive;
        assert!(!AgentRegistry::can_edit(&agent, "a.js"));
    }

    #[test]
    fn can_edit_unrestricted_when_list_empty() {
        let agent = Agent::new("GPT-4", "GPT-4", AgentKind::Editor);
        assert!(AgentRegistry::can_edit(&agent, "anything.py"));
    }

    #[test]
    fn can_edit_matches_regex_entries() {
        let mut agent = Agent::new("GPT-4", "GPT-4", AgentKind::Editor);
        agent.metadata.can_edit = vec![r".*\.js$".to_string()];
        assert!(AgentRegistry::can_edit(&agent, "a.js"));
        assert!(!AgentRegistry::can_edit(&agent, "a.py"));
    }

    #[test]
    fn can_edit_skips_invalid_regex_entries() {
        let mut agent = Agent::new("GPT-4", "GPT-4", AgentKind::Editor);
        agent.metadata.can_edit = vec!["(unterminated".to_string(), r".*\.js$".to_string()];
        assert!(AgentRegistry::can_edit(&agent, "a.js"));
    }

    #[test]
    fn can_edit_does_not_auto_translate_glob() {
        let mut agent = Agent::new("GPT-4", "GPT-4", AgentKind::Editor);
        agent.metadata.can_edit = vec!["*.js".to_string()];
        // "*.js" is not a valid regex (dangling repetition operator) and is
        // skipped, leaving the agent with no usable restriction entries —
        // denying rather than silently behaving like a glob.
        assert!(!AgentRegistry::can_edit(&agent, "a.js"));
    }

    proptest! {
        #[test]
        fn register_idempotence_holds_for_arbitrary_identities(identity in "[A-Za-z0-9_-]{1,20}") {
            let store = InMemoryStore::new();
            let registry = AgentRegistry::new(&store);
            let first = registry.register(config(&identity)).unwrap();
            let second = registry.register(config(&identity)).unwrap();
            prop_assert_eq!(first.identity, second.identity);
            prop_assert_eq!(registry.by_identity(&identity).unwrap().unwrap().identity, identity);
        }
    }
}
