// SPDX-License-Identifier: Apache-2.0
//! Content hashing and per-path fingerprint tracking (§4.2).
//!
//! Hash domain policy: the fingerprint is content-only, `SHA256(bytes)`
//! rendered as lower-case hex — no domain prefix. Fingerprints are
//! authoritative for change detection within the system; filesystem mtime is
//! advisory only.
#![allow(clippy::module_name_repetitions)]

use chrono::Utc;
use sha2::{Digest, Sha256};
use voidsync_store::Store;
use voidsync_types::{Fingerprint, VoidSyncError};

/// Compute the lower-case hex SHA-256 hash of `bytes`.
#[must_use]
pub fn hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Tracks fingerprints for paths via a [`Store`].
pub struct Fingerprinter<'a> {
    store: &'a dyn Store,
}

impl<'a> Fingerprinter<'a> {
    /// Build a fingerprinter backed by `store`.
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// The last-saved fingerprint for `path`, if any.
    pub fn fingerprint(&self, path: &str) -> Result<Option<Fingerprint>, VoidSyncError> {
        self.store.get_fingerprint(path)
    }

    /// Record `hash` as the fingerprint for `path`, with `last_modified = now`.
    pub fn save(&self, path: &str, hash: String) -> Result<(), VoidSyncError> {
        self.store.put_fingerprint(Fingerprint {
            path: path.to_string(),
            hash,
            last_modified: Utc::now(),
        })
    }

    /// `true` when `current_bytes`'s hash differs from the last saved
    /// fingerprint for `path` — or when no prior hash exists, to be safe
    /// (per §4.2: absence of history is treated as "changed").
    pub fn has_changed(&self, path: &str, current_bytes: &[u8]) -> Result<bool, VoidSyncError> {
        let Some(fp) = self.fingerprint(path)? else {
            return Ok(true);
        };
        Ok(fp.hash != hash(current_bytes))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use voidsync_store::InMemoryStore;

    #[test]
    fn hash_is_lowercase_hex_sha256() {
        let digest = hash(b"hello");
        assert_eq!(
            digest,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn has_changed_is_true_without_prior_hash() {
        let store = InMemoryStore::new();
        let fp = Fingerprinter::new(&store);
        assert!(fp.has_changed("a.js", b"x").unwrap());
    }

    #[test]
    fn has_changed_detects_drift() {
        let store = InMemoryStore::new();
        let fp = Fingerprinter::new(&store);
        fp.save("a.js", hash(b"x=1\n")).unwrap();
        assert!(!fp.has_changed("a.js", b"x=1\n").unwrap());
        assert!(fp.has_changed("a.js", b"x=2\n").unwrap());
    }
}
