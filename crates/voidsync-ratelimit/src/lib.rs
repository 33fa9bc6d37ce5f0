// SPDX-License-Identifier: Apache-2.0
//! Per-agent fixed-window rate limiter with escalating soft block (§4.5).
//!
//! Model: on every accepted request, [`RateLimiter::track`] increments the
//! agent's counter (resetting the window first if it has elapsed).
//! [`RateLimiter::is_limited`] then reports whether the counter exceeds
//! `max_requests` within the current window, or whether a standing block is
//! in force. If `request_count > 1.5 * max_requests` at that check, the agent
//! is additionally blocked for `2 * window_size`.
//!
//! Counter state is mirrored to a [`Store`] so restarts don't erase standing
//! blocks: the in-memory layer rehydrates a given agent's counter from the
//! Store the first time it is observed in this process.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;
use voidsync_store::Store;
use voidsync_types::{RateLimitCounter, VoidSyncError};

/// Default window: 1000 requests per 60 minutes (§4.5, §6).
pub const DEFAULT_MAX_REQUESTS: u32 = 1000;
/// Default window size: 60 minutes.
pub fn default_window_size() -> Duration {
    Duration::minutes(60)
}

/// The escalation multiplier: exceeding `1.5 * max_requests` triggers a
/// standing block.
const ESCALATION_MULTIPLIER: f64 = 1.5;
/// The escalation block duration multiplier, in units of `window_size`.
const ESCALATION_BLOCK_WINDOWS: i32 = 2;

/// Per-agent sliding-window rate limiter, backed by a [`Store`].
pub struct RateLimiter<'a> {
    store: &'a dyn Store,
    window_size: Duration,
    max_requests: u32,
    memory: Mutex<HashMap<String, RateLimitCounter>>,
}

impl<'a> RateLimiter<'a> {
    /// Build a limiter over `store` with the given window and request cap.
    #[must_use]
    pub fn new(store: &'a dyn Store, window_size: Duration, max_requests: u32) -> Self {
        Self {
            store,
            window_size,
            max_requests,
            memory: Mutex::new(HashMap::new()),
        }
    }

    /// Build a limiter using the §6 defaults (1000 req / 60 min).
    #[must_use]
    pub fn with_defaults(store: &'a dyn Store) -> Self {
        Self::new(store, default_window_size(), DEFAULT_MAX_REQUESTS)
    }

    fn load_or_rehydrate(
        &self,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitCounter, VoidSyncError> {
        if let Some(counter) = self.memory.lock().ok().and_then(|m| m.get(agent_id).cloned()) {
            return Ok(counter);
        }
        let rehydrated = self.store.get_rate_limit_counter(agent_id)?;
        Ok(rehydrated.unwrap_or_else(|| RateLimitCounter::new(agent_id, self.max_requests, now)))
    }

    fn persist(&self, counter: RateLimitCounter) -> Result<(), VoidSyncError> {
        if let Ok(mut guard) = self.memory.lock() {
            guard.insert(counter.agent_id.clone(), counter.clone());
        }
        self.store.put_rate_limit_counter(counter)
    }

    /// Record one request from `agent_id`, resetting the window first if it
    /// has elapsed. Does not itself report whether the agent is limited —
    /// call [`Self::is_limited`] afterward, per §4.5's "track then check".
    pub fn track(&self, agent_id: &str) -> Result<(), VoidSyncError> {
        let now = Utc::now();
        let mut counter = self.load_or_rehydrate(agent_id, now)?;

        if now - counter.window_start > self.window_size {
            counter.window_start = now;
            counter.request_count = 0;
        }
        counter.request_count += 1;
        counter.last_update = now;

        self.persist(counter)
    }

    /// Whether `agent_id` is currently rate-limited: over its window cap, or
    /// under a standing block. May escalate into a standing block as a side
    /// effect, per §4.5.
    pub fn is_limited(&self, agent_id: &str) -> Result<bool, VoidSyncError> {
        let now = Utc::now();
        let mut counter = self.load_or_rehydrate(agent_id, now)?;

        if let Some(blocked_until) = counter.blocked_until {
            if blocked_until > now {
                return Ok(true);
            }
        }

        let over_cap = counter.request_count > counter.limit;
        let escalation_threshold =
            (f64::from(counter.limit) * ESCALATION_MULTIPLIER).floor() as u32;

        if counter.request_count > escalation_threshold {
            let block_until = now + self.window_size * ESCALATION_BLOCK_WINDOWS;
            warn!(agent_id, request_count = counter.request_count, "escalating to standing block");
            counter.blocked_until = Some(block_until);
            self.persist(counter)?;
            return Ok(true);
        }

        Ok(over_cap)
    }

    /// Clear both the in-memory and persisted counter for `agent_id`.
    pub fn reset(&self, agent_id: &str) -> Result<(), VoidSyncError> {
        if let Ok(mut guard) = self.memory.lock() {
            guard.remove(agent_id);
        }
        self.persist(RateLimitCounter::new(agent_id, self.max_requests, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use voidsync_store::InMemoryStore;

    #[test]
    fn third_request_within_window_is_limited() {
        let store = InMemoryStore::new();
        let limiter = RateLimiter::new(&store, Duration::seconds(60), 2);

        for _ in 0..2 {
            limiter.track("gpt").unwrap();
            assert!(!limiter.is_limited("gpt").unwrap());
        }
        limiter.track("gpt").unwrap();
        assert!(limiter.is_limited("gpt").unwrap());
    }

    #[test]
    fn escalation_blocks_beyond_window_reset() {
        let store = InMemoryStore::new();
        let limiter = RateLimiter::new(&store, Duration::seconds(60), 2);

        // 4 requests > 1.5 * 2 == 3, so the 4th trips the escalation block.
        for _ in 0..4 {
            limiter.track("gpt").unwrap();
        }
        assert!(limiter.is_limited("gpt").unwrap());

        // Simulate the window having elapsed: reset window_start manually by
        // rehydrating and persisting an elapsed counter, leaving blocked_until.
        let mut counter = store.get_rate_limit_counter("gpt").unwrap().unwrap();
        counter.window_start = Utc::now() - Duration::seconds(61);
        counter.request_count = 0;
        store.put_rate_limit_counter(counter).unwrap();

        // is_limited should still see the standing block even though the
        // window itself has reset.
        assert!(limiter.is_limited("gpt").unwrap());
    }

    #[test]
    fn reset_clears_block() {
        let store = InMemoryStore::new();
        let limiter = RateLimiter::new(&store, Duration::seconds(60), 2);
        for _ in 0..4 {
            limiter.track("gpt").unwrap();
        }
        assert!(limiter.is_limited("gpt").unwrap());
        limiter.reset("gpt").unwrap();
        assert!(!limiter.is_limited("gpt").unwrap());
    }

    #[test]
    fn rehydrates_standing_block_from_store_on_fresh_instance() {
        let store = InMemoryStore::new();
        {
            let limiter = RateLimiter::new(&store, Duration::seconds(60), 2);
            for _ in 0..4 {
                limiter.track("gpt").unwrap();
            }
            assert!(limiter.is_limited("gpt").unwrap());
        }
        // Fresh limiter instance (simulating a process restart) still honors
        // the standing block persisted to the store.
        let limiter = RateLimiter::new(&store, Duration::seconds(60), 2);
        assert!(limiter.is_limited("gpt").unwrap());
    }
}
