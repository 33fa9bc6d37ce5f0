// SPDX-License-Identifier: Apache-2.0
//! Per-path content fingerprints (§3, §4.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SHA-256 hash (lower-case hex) of a path's last-committed bytes, with the
/// last-modified timestamp recorded at that write.
///
/// Invariant: if the production file at `path` exists, its fingerprint equals
/// the hash of its current bytes *at the last write*; divergence indicates
/// external tampering (drift, §4.8).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Workspace-relative path this fingerprint describes.
    pub path: String,
    /// Lower-case hex SHA-256 of the bytes at last write.
    pub hash: String,
    /// When that write happened. Advisory; `hash` is authoritative.
    pub last_modified: DateTime<Utc>,
}
