// SPDX-License-Identifier: Apache-2.0
//! The plugin capability and the context/outcome values it exchanges with
//! the pipeline (§4.6).

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

/// What a plugin declares itself to be. Informational for now — the pipeline
/// dispatches purely on stage and pattern, not kind — but callers and
/// dashboards use it to group and label plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    /// Rejects or warns without mutating content.
    Validator,
    /// Mutates content (formatting, codegen).
    Processor,
    /// A processor specialized for idempotent reformatting.
    Formatter,
    /// Read-only inspection that only ever produces warnings.
    Analyzer,
    /// Side-effecting observer with no content opinion.
    Hook,
}

/// A pipeline stage, in the order a change moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Runs during `submit`, before a change is recorded.
    PreSync,
    /// Runs during `approve`, over the sandbox-staged content.
    DuringSync,
    /// Runs after production is written.
    PostSync,
    /// Runs immediately before a commit is made durable.
    PreCommit,
    /// Runs immediately after a commit is made durable.
    PostCommit,
}

/// The mutable shadow a plugin chain runs over. Each plugin sees the
/// cumulative effect of prior plugins in the same run.
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Workspace-relative path under review.
    pub path: String,
    /// Current content, possibly already mutated by earlier plugins.
    pub content: String,
    /// Content as it stood in production before this change, if known.
    pub original_content: Option<String>,
    /// Free-form metadata, shallow-merged across the chain.
    pub metadata: HashMap<String, Value>,
    /// Stage this run is executing at.
    pub stage: Stage,
    /// Identity of the agent whose change is under review.
    pub agent_id: String,
}

impl PluginContext {
    /// Build a fresh context for a pipeline run.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        content: impl Into<String>,
        stage: Stage,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            original_content: None,
            metadata: HashMap::new(),
            stage,
            agent_id: agent_id.into(),
        }
    }
}

/// What a single plugin's `execute` call reports.
#[derive(Debug, Clone, Default)]
pub struct PluginOutcome {
    /// Whether this plugin considers the content acceptable.
    pub success: bool,
    /// Failure message, set when `success` is `false`.
    pub error: Option<String>,
    /// Non-fatal warnings, always propagated regardless of `success`.
    pub warnings: Vec<String>,
    /// Replacement content, if this plugin mutated it.
    pub replacement_content: Option<String>,
    /// Metadata to shallow-merge into the context.
    pub metadata_merge: Option<HashMap<String, Value>>,
    /// If set, no further plugins run in this stage's chain.
    pub skip_remaining: bool,
}

impl PluginOutcome {
    /// A bare success with no mutation or warnings.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// A failure carrying `message`.
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// A success that also carries `warning`.
    #[must_use]
    pub fn warn(warning: impl Into<String>) -> Self {
        Self {
            success: true,
            warnings: vec![warning.into()],
            ..Self::default()
        }
    }

    /// A success that replaces the content with `content`.
    #[must_use]
    pub fn replace(content: impl Into<String>) -> Self {
        Self {
            success: true,
            replacement_content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// A validator/processor/formatter/analyzer/hook participating in the
/// pipeline. Implementations must be cheap and synchronous — real I/O or
/// network calls belong to the host application, not a plugin.
pub trait Plugin: Send + Sync {
    /// Stable identifier, used in `PluginFailure` and logs.
    fn id(&self) -> &str;

    /// What kind of plugin this is.
    fn kind(&self) -> PluginKind;

    /// Stages this plugin participates in.
    fn stages(&self) -> &[Stage];

    /// Path patterns this plugin applies to. Empty means "all paths".
    fn patterns(&self) -> &[Regex];

    /// Whether this plugin currently participates in any run.
    fn enabled(&self) -> bool {
        true
    }

    /// Run this plugin over `context`.
    fn execute(&self, context: &PluginContext) -> PluginOutcome;

    /// Whether `path` matches this plugin's pattern list (or it has none).
    fn matches(&self, path: &str) -> bool {
        let patterns = self.patterns();
        patterns.is_empty() || patterns.iter().any(|re| re.is_match(path))
    }
}
