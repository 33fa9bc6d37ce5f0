// SPDX-License-Identifier: Apache-2.0
//! Pipeline execution: selects matching enabled plugins for a stage, runs
//! them in registration order over a shared shadow context, and aggregates
//! the outcome (§4.6).

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;
use voidsync_types::{PluginFailure, VoidSyncError};

use crate::plugin::{Plugin, PluginContext, Stage};

/// Default per-plugin execution budget (§6 `pluginTimeout`).
pub const DEFAULT_PLUGIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The non-fatal residue of a successful (or partially successful) run:
/// warnings the caller must still surface.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// Final content after every plugin mutation in this run.
    pub content: String,
    /// Warnings collected across every plugin that ran, in run order.
    pub warnings: Vec<String>,
}

/// Ordered collection of plugins, executed per stage.
pub struct Pipeline {
    plugins: Vec<Arc<dyn Plugin>>,
    timeout: Duration,
}

impl Pipeline {
    /// An empty pipeline with the default plugin timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            timeout: DEFAULT_PLUGIN_TIMEOUT,
        }
    }

    /// Override the per-plugin execution budget.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a plugin. Registration order is execution order.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// Run every enabled, pattern-matching plugin registered for `stage`
    /// against `path`, in registration order, starting from `content`.
    ///
    /// Each plugin's `execute` is bounded by this pipeline's timeout; a
    /// timed-out plugin is recorded as a failure rather than left to hang.
    pub async fn run(
        &self,
        stage: Stage,
        path: &str,
        mut context: PluginContext,
    ) -> Result<PipelineReport, VoidSyncError> {
        let mut warnings = Vec::new();
        let mut failures = Vec::new();

        for plugin in self.selected(stage, path) {
            let run_context = context.clone();
            let plugin_id = plugin.id().to_string();
            let outcome = match tokio::time::timeout(self.timeout, run_one(plugin.clone(), run_context)).await {
                Ok(outcome) => outcome,
                Err(_elapsed) => {
                    failures.push(PluginFailure {
                        plugin_id: plugin_id.clone(),
                        message: "plugin exceeded its execution timeout".to_string(),
                    });
                    continue;
                }
            };

            warnings.extend(outcome.warnings);

            if !outcome.success {
                let message = outcome
                    .error
                    .unwrap_or_else(|| "plugin rejected the change".to_string());
                warn!(plugin = %plugin_id, %message, "plugin failed");
                failures.push(PluginFailure { plugin_id, message });
                continue;
            }

            if let Some(replacement) = outcome.replacement_content {
                context.content = replacement;
            }
            if let Some(merge) = outcome.metadata_merge {
                context.metadata.extend(merge);
            }
            if outcome.skip_remaining {
                break;
            }
        }

        if failures.is_empty() {
            Ok(PipelineReport {
                content: context.content,
                warnings,
            })
        } else {
            Err(VoidSyncError::PluginRejected(failures))
        }
    }

    fn selected(&self, stage: Stage, path: &str) -> Vec<Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .filter(|p| p.enabled() && p.stages().contains(&stage) && p.matches(path))
            .cloned()
            .collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_one(plugin: Arc<dyn Plugin>, context: PluginContext) -> crate::plugin::PluginOutcome {
    plugin.execute(&context)
}
