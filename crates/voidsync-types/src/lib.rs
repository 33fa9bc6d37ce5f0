// SPDX-License-Identifier: Apache-2.0
//! Shared data model and error taxonomy for the change-review pipeline.
//!
//! Every other `voidsync-*` crate depends on this one for the five entities
//! owned exclusively by the Store abstraction (`Agent`, `Change`, `Lock`,
//! `RateLimitCounter`, `Fingerprint`) and for the single [`VoidSyncError`]
//! taxonomy surfaced at every boundary.

pub mod agent;
pub mod change;
pub mod error;
pub mod fingerprint;
pub mod lock;
pub mod path;
pub mod rate_limit;

pub use agent::{Agent, AgentKind, AgentMetadata, AgentStatus};
pub use change::{Change, ChangeFilter, ChangeId, ChangeMetadata, ChangePage, ChangeStatus};
pub use error::{ChangeIdDisplay, PluginFailure, VoidSyncError};
pub use fingerprint::Fingerprint;
pub use lock::{Lock, LockId};
pub use path::normalize as normalize_path;
pub use rate_limit::RateLimitCounter;
