// SPDX-License-Identifier: Apache-2.0
//! The five built-in plugins named in §4.6: a syntax validator, a security
//! validator, a JSON formatter, an accessibility validator, and a
//! pattern-driven lint plugin.

use regex::Regex;

use crate::plugin::{Plugin, PluginContext, PluginKind, PluginOutcome, Stage};

fn extension(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or("")
}

/// Rejects content that fails to parse for its extension's language. Only
/// JSON is actually parsed — §1's non-goals rule out deep static analysis,
/// so every other extension is accepted unconditionally.
pub struct SyntaxValidator {
    stages: Vec<Stage>,
}

impl SyntaxValidator {
    /// A syntax validator running at the given stages.
    #[must_use]
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }
}

impl Plugin for SyntaxValidator {
    fn id(&self) -> &str {
        "syntax-validator"
    }

    fn kind(&self) -> PluginKind {
        PluginKind::Validator
    }

    fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn patterns(&self) -> &[Regex] {
        &[]
    }

    fn execute(&self, context: &PluginContext) -> PluginOutcome {
        if extension(&context.path) == "json" {
            if let Err(err) = serde_json::from_str::<serde_json::Value>(&context.content) {
                return PluginOutcome::fail(format!("invalid JSON: {err}"));
            }
        }
        PluginOutcome::ok()
    }
}

/// Pattern-based credential/injection scan. Always warns, never fails — the
/// system trusts its operators to read warnings, not a security gate.
pub struct SecurityValidator {
    stages: Vec<Stage>,
    patterns: Vec<(Regex, &'static str)>,
}

impl SecurityValidator {
    /// A security validator running at the given stages, with the default
    /// credential/injection pattern set.
    #[must_use]
    #[allow(clippy::expect_used)] // documented panic: literal patterns below are compile-time constant
    pub fn new(stages: Vec<Stage>) -> Self {
        let patterns = vec![
            (
                Regex::new(r#"(?i)(api[_-]?key|secret|password)\s*[:=]\s*['"][^'"]{4,}['"]"#)
                    .expect("built-in pattern compiles"),
                "possible hard-coded credential",
            ),
            (
                Regex::new(r"(?i)\beval\s*\(").expect("built-in pattern compiles"),
                "use of eval()",
            ),
            (
                Regex::new(r"(?i)\bexec\s*\(\s*['\"]").expect("built-in pattern compiles"),
                "shell command built from literal exec() call",
            ),
        ];
        Self { stages, patterns }
    }
}

impl Plugin for SecurityValidator {
    fn id(&self) -> &str {
        "security-validator"
    }

    fn kind(&self) -> PluginKind {
        PluginKind::Validator
    }

    fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn patterns(&self) -> &[Regex] {
        &[]
    }

    fn execute(&self, context: &PluginContext) -> PluginOutcome {
        let mut outcome = PluginOutcome::ok();
        for (pattern, message) in &self.patterns {
            if pattern.is_match(&context.content) {
                outcome.warnings.push((*message).to_string());
            }
        }
        outcome
    }
}

/// Pretty-prints JSON content. A no-op for every other extension.
pub struct JsonFormatter {
    stages: Vec<Stage>,
}

impl JsonFormatter {
    /// A JSON formatter running at the given stages.
    #[must_use]
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }
}

impl Plugin for JsonFormatter {
    fn id(&self) -> &str {
        "json-formatter"
    }

    fn kind(&self) -> PluginKind {
        PluginKind::Formatter
    }

    fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn patterns(&self) -> &[Regex] {
        &[]
    }

    fn execute(&self, context: &PluginContext) -> PluginOutcome {
        if extension(&context.path) != "json" {
            return PluginOutcome::ok();
        }
        match serde_json::from_str::<serde_json::Value>(&context.content) {
            Ok(value) => match serde_json::to_string_pretty(&value) {
                Ok(mut pretty) => {
                    pretty.push('\n');
                    PluginOutcome::replace(pretty)
                }
                Err(err) => PluginOutcome::fail(format!("failed to format JSON: {err}")),
            },
            Err(_) => PluginOutcome::ok(),
        }
    }
}

static HEADING_TAG: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();

#[allow(clippy::expect_used)] // documented panic: literal pattern is compile-time constant
fn heading_tag_pattern() -> &'static Regex {
    HEADING_TAG.get_or_init(|| {
        Regex::new(r"(?i)<h([1-6])\b").expect("built-in heading pattern compiles")
    })
}

/// HTML/JSX heading-order check. Warnings only, per §4.6.
pub struct AccessibilityValidator {
    stages: Vec<Stage>,
    patterns: Vec<Regex>,
}

impl AccessibilityValidator {
    /// An accessibility validator running at the given stages, scoped to
    /// `.html`, `.jsx`, and `.tsx` files.
    #[must_use]
    #[allow(clippy::expect_used)] // documented panic: literal patterns below are compile-time constant
    pub fn new(stages: Vec<Stage>) -> Self {
        let patterns = vec![
            Regex::new(r"(?i)\.html?$").expect("built-in pattern compiles"),
            Regex::new(r"(?i)\.jsx$").expect("built-in pattern compiles"),
            Regex::new(r"(?i)\.tsx$").expect("built-in pattern compiles"),
        ];
        Self { stages, patterns }
    }
}

impl Plugin for AccessibilityValidator {
    fn id(&self) -> &str {
        "accessibility-validator"
    }

    fn kind(&self) -> PluginKind {
        PluginKind::Analyzer
    }

    fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn execute(&self, context: &PluginContext) -> PluginOutcome {
        let mut outcome = PluginOutcome::ok();
        let mut previous_level: Option<u32> = None;

        for capture in heading_tag_pattern().captures_iter(&context.content) {
            let Some(level) = capture.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) else {
                continue;
            };
            if let Some(prev) = previous_level {
                if level > prev + 1 {
                    outcome.warnings.push(format!(
                        "heading level jumps from h{prev} to h{level}, skipping a level"
                    ));
                }
            }
            previous_level = Some(level);
        }

        outcome
    }
}

/// Severity of a [`LintRule`] match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Recorded and surfaced, never blocks.
    Warning,
    /// Blocks the change.
    Error,
}

/// A single pattern-driven lint rule.
pub struct LintRule {
    /// Pattern that triggers this rule when it matches the content.
    pub pattern: Regex,
    /// Message surfaced as a warning or failure reason.
    pub message: String,
    /// Whether a match blocks the change.
    pub severity: Severity,
}

/// Pattern-driven lint rules with severities; only `Error` blocks (§4.6).
pub struct LintPlugin {
    stages: Vec<Stage>,
    patterns: Vec<Regex>,
    rules: Vec<LintRule>,
}

impl LintPlugin {
    /// A lint plugin running `rules` at the given stages, scoped to paths
    /// matching `patterns` (empty means all paths).
    #[must_use]
    pub fn new(stages: Vec<Stage>, patterns: Vec<Regex>, rules: Vec<LintRule>) -> Self {
        Self {
            stages,
            patterns,
            rules,
        }
    }
}

impl Plugin for LintPlugin {
    fn id(&self) -> &str {
        "lint-plugin"
    }

    fn kind(&self) -> PluginKind {
        PluginKind::Validator
    }

    fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn execute(&self, context: &PluginContext) -> PluginOutcome {
        let mut outcome = PluginOutcome::ok();
        let mut blocking_messages = Vec::new();

        for rule in &self.rules {
            if !rule.pattern.is_match(&context.content) {
                continue;
            }
            match rule.severity {
                Severity::Warning => outcome.warnings.push(rule.message.clone()),
                Severity::Error => blocking_messages.push(rule.message.clone()),
            }
        }

        if blocking_messages.is_empty() {
            outcome
        } else {
            let mut failed = PluginOutcome::fail(blocking_messages.join("; "));
            failed.warnings = outcome.warnings;
            failed
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn ctx(path: &str, content: &str) -> PluginContext {
        PluginContext::new(path, content, Stage::PreSync, "gpt-4")
    }

    #[test]
    fn syntax_validator_rejects_malformed_json() {
        let plugin = SyntaxValidator::new(vec![Stage::PreSync]);
        let outcome = plugin.execute(&ctx("x.json", "{ not json"));
        assert!(!outcome.success);
    }

    #[test]
    fn syntax_validator_ignores_non_json() {
        let plugin = SyntaxValidator::new(vec![Stage::PreSync]);
        let outcome = plugin.execute(&ctx("x.py", "def f(: invalid python syntax"));
        assert!(outcome.success);
    }

    #[test]
    fn security_validator_warns_but_never_fails() {
        let plugin = SecurityValidator::new(vec![Stage::PreSync]);
        let outcome = plugin.execute(&ctx("x.py", "password = \"hunter2345\""));
        assert!(outcome.success);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn json_formatter_pretty_prints() {
        let plugin = JsonFormatter::new(vec![Stage::PreSync]);
        let outcome = plugin.execute(&ctx("x.json", "{\"a\":1}"));
        assert_eq!(outcome.replacement_content.unwrap(), "{\n  \"a\": 1\n}\n");
    }

    #[test]
    fn accessibility_validator_flags_skipped_heading_level() {
        let plugin = AccessibilityValidator::new(vec![Stage::PreSync]);
        let outcome = plugin.execute(&ctx("page.html", "<h1>Title</h1><h3>Sub</h3>"));
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn lint_plugin_error_severity_blocks() {
        let rules = vec![LintRule {
            pattern: Regex::new(r"TODO").unwrap(),
            message: "TODOs are not allowed".to_string(),
            severity: Severity::Error,
        }];
        let plugin = LintPlugin::new(vec![Stage::PreSync], vec![], rules);
        let outcome = plugin.execute(&ctx("x.rs", "// TODO: fix this"));
        assert!(!outcome.success);
    }

    #[test]
    fn lint_plugin_warning_severity_does_not_block() {
        let rules = vec![LintRule {
            pattern: Regex::new(r"console\.log").unwrap(),
            message: "stray console.log".to_string(),
            severity: Severity::Warning,
        }];
        let plugin = LintPlugin::new(vec![Stage::PreSync], vec![], rules);
        let outcome = plugin.execute(&ctx("x.js", "console.log('hi')"));
        assert!(outcome.success);
        assert_eq!(outcome.warnings.len(), 1);
    }
}
