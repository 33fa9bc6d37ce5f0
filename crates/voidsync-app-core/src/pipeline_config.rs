// SPDX-License-Identifier: Apache-2.0
//! The enumerated configuration table (§6), loaded through a
//! [`crate::config::ConfigService`] with environment-variable overrides for
//! deployment without touching the on-disk config blob.

use std::path::PathBuf;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigService, ConfigStore};

/// The config key this table is stored under.
pub const CONFIG_KEY: &str = "pipeline";

/// Every tunable named in §6, with the defaults given there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// The authoritative production tree.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    /// Staging tree mirroring `workspace_root` subpaths touched by
    /// in-flight approvals.
    #[serde(default = "default_sandbox_root")]
    pub sandbox_root: PathBuf,
    /// Push-channel upgrade path.
    #[serde(default = "default_push_path")]
    pub push_path: String,
    /// Largest content a single submission may carry, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Rate limiter fixed-window size, in seconds.
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: i64,
    /// Rate limiter requests-per-window cap.
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: u32,
    /// Context lines surrounding each diff hunk.
    #[serde(default = "default_diff_context_lines")]
    pub diff_context_lines: usize,
    /// Push-channel keep-alive probe interval, in seconds.
    #[serde(default = "default_keep_alive_interval_secs")]
    pub keep_alive_interval_secs: i64,
    /// Per-plugin execution budget, in seconds.
    #[serde(default = "default_plugin_timeout_secs")]
    pub plugin_timeout_secs: u64,
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("./project")
}
fn default_sandbox_root() -> PathBuf {
    PathBuf::from("./sandbox")
}
fn default_push_path() -> String {
    "/ws".to_string()
}
fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}
fn default_rate_limit_window_secs() -> i64 {
    3600
}
fn default_rate_limit_max() -> u32 {
    1000
}
fn default_diff_context_lines() -> usize {
    3
}
fn default_keep_alive_interval_secs() -> i64 {
    30
}
fn default_plugin_timeout_secs() -> u64 {
    5
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            sandbox_root: default_sandbox_root(),
            push_path: default_push_path(),
            max_file_size: default_max_file_size(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            rate_limit_max: default_rate_limit_max(),
            diff_context_lines: default_diff_context_lines(),
            keep_alive_interval_secs: default_keep_alive_interval_secs(),
            plugin_timeout_secs: default_plugin_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    /// The rate limiter's fixed window, as a [`chrono::Duration`].
    #[must_use]
    pub fn rate_limit_window(&self) -> Duration {
        Duration::seconds(self.rate_limit_window_secs)
    }

    /// The push channel's keep-alive interval, as a [`chrono::Duration`].
    #[must_use]
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::seconds(self.keep_alive_interval_secs)
    }

    /// The per-plugin execution budget, as a [`std::time::Duration`].
    #[must_use]
    pub fn plugin_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.plugin_timeout_secs)
    }

    /// Apply `VOIDSYNC_*` environment overrides on top of whatever was
    /// loaded from disk, so deployments can tune the pipeline without
    /// touching the persisted config blob.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_path("VOIDSYNC_WORKSPACE_ROOT") {
            self.workspace_root = v;
        }
        if let Some(v) = env_path("VOIDSYNC_SANDBOX_ROOT") {
            self.sandbox_root = v;
        }
        if let Ok(v) = std::env::var("VOIDSYNC_PUSH_PATH") {
            self.push_path = v;
        }
        if let Some(v) = env_parsed("VOIDSYNC_MAX_FILE_SIZE") {
            self.max_file_size = v;
        }
        if let Some(v) = env_parsed("VOIDSYNC_RATE_LIMIT_WINDOW_SECS") {
            self.rate_limit_window_secs = v;
        }
        if let Some(v) = env_parsed("VOIDSYNC_RATE_LIMIT_MAX") {
            self.rate_limit_max = v;
        }
        if let Some(v) = env_parsed("VOIDSYNC_DIFF_CONTEXT_LINES") {
            self.diff_context_lines = v;
        }
        if let Some(v) = env_parsed("VOIDSYNC_KEEP_ALIVE_INTERVAL_SECS") {
            self.keep_alive_interval_secs = v;
        }
        if let Some(v) = env_parsed("VOIDSYNC_PLUGIN_TIMEOUT_SECS") {
            self.plugin_timeout_secs = v;
        }
        self
    }

    /// Load the persisted config (falling back to defaults when absent),
    /// then layer environment overrides on top.
    pub fn load<S: ConfigStore>(
        service: &ConfigService<S>,
    ) -> Result<Self, crate::config::ConfigError> {
        let loaded = service.load::<Self>(CONFIG_KEY)?.unwrap_or_default();
        Ok(loaded.with_env_overrides())
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name).map(PathBuf::from)
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.workspace_root, PathBuf::from("./project"));
        assert_eq!(config.sandbox_root, PathBuf::from("./sandbox"));
        assert_eq!(config.push_path, "/ws");
        assert_eq!(config.max_file_size, 5 * 1024 * 1024);
        assert_eq!(config.rate_limit_window_secs, 3600);
        assert_eq!(config.rate_limit_max, 1000);
        assert_eq!(config.diff_context_lines, 3);
        assert_eq!(config.keep_alive_interval_secs, 30);
        assert_eq!(config.plugin_timeout_secs, 5);
    }

    #[test]
    fn duration_helpers_convert_seconds() {
        let config = PipelineConfig::default();
        assert_eq!(config.rate_limit_window(), Duration::seconds(3600));
        assert_eq!(config.keep_alive_interval(), Duration::seconds(30));
        assert_eq!(config.plugin_timeout(), std::time::Duration::from_secs(5));
    }
}
