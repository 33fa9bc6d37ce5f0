// SPDX-License-Identifier: Apache-2.0
//! Per-agent rate-limit counter state (§3, §4.5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed-window counter with an escalating soft block, mirrored to the Store
/// so a process restart does not erase a standing block.
///
/// Invariant: at any instant `window_start <= now` and `request_count >= 0`
/// (the latter is structural via `u32`); when `now - window_start >
/// window_size`, the counter is logically reset on next observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitCounter {
    /// Agent this counter belongs to.
    pub agent_id: String,
    /// Requests observed within the current window.
    pub request_count: u32,
    /// Start of the current window.
    pub window_start: DateTime<Utc>,
    /// Timestamp of the last observation.
    pub last_update: DateTime<Utc>,
    /// If set and in the future, the agent is under a standing block
    /// regardless of the current window's count.
    pub blocked_until: Option<DateTime<Utc>>,
    /// Requests permitted per window.
    pub limit: u32,
}

impl RateLimitCounter {
    /// A fresh counter for `agent_id`, with its window starting at `now`.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, limit: u32, now: DateTime<Utc>) -> Self {
        Self {
            agent_id: agent_id.into(),
            request_count: 0,
            window_start: now,
            last_update: now,
            blocked_until: None,
            limit,
        }
    }
}
