// SPDX-License-Identifier: Apache-2.0
//! Ordered validator/processor pipeline keyed by file pattern and pipeline
//! stage (§4.6).
//!
//! [`Pipeline`] holds an ordered set of [`Plugin`] implementations and runs
//! the ones matching a given [`Stage`] and path over a mutable
//! [`PluginContext`], aggregating warnings and failures into a
//! [`PipelineReport`] or a [`voidsync_types::VoidSyncError::PluginRejected`].

pub mod builtins;
pub mod pipeline;
pub mod plugin;

pub use pipeline::{Pipeline, PipelineReport, DEFAULT_PLUGIN_TIMEOUT};
pub use plugin::{Plugin, PluginContext, PluginKind, PluginOutcome, Stage};

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use std::sync::Arc;

    use crate::builtins::{JsonFormatter, SyntaxValidator};
    use crate::{Pipeline, PluginContext, Stage};

    #[tokio::test(flavor = "current_thread")]
    async fn chain_runs_processor_then_validator_in_order() {
        let mut pipeline = Pipeline::new();
        pipeline.register(Arc::new(JsonFormatter::new(vec![Stage::PreSync])));
        pipeline.register(Arc::new(SyntaxValidator::new(vec![Stage::PreSync])));

        let ctx = PluginContext::new("x.json", "{ \"a\": 1 }", Stage::PreSync, "gpt-4");
        let report = pipeline.run(Stage::PreSync, "x.json", ctx).await.unwrap();
        assert_eq!(report.content, "{\n  \"a\": 1\n}\n");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_json_fails_validator_with_no_stored_change() {
        let mut pipeline = Pipeline::new();
        pipeline.register(Arc::new(SyntaxValidator::new(vec![Stage::PreSync])));

        let ctx = PluginContext::new("y.json", "", Stage::PreSync, "gpt-4");
        let result = pipeline.run(Stage::PreSync, "y.json", ctx).await;
        assert!(result.is_err());
    }
}
