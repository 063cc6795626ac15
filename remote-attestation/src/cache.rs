use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::types::{AttestationRecord, TargetId};

#[derive(Debug, Clone)]
struct CacheEntry {
    record: AttestationRecord,
    expires_at: Instant,
}

/// Short-lived attestation records keyed by target.
///
/// Expiry is measured on the tokio clock. Inserting replaces the entry for a target
/// atomically; readers always get a copy of a whole record.
#[derive(Debug)]
pub struct AttestationCache {
    entries: DashMap<TargetId, CacheEntry>,
    ttl: Duration,
}

impl AttestationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached record for `target` if it has not expired.
    pub fn get(&self, target: TargetId) -> Option<AttestationRecord> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(&target) {
            if entry.expires_at > now {
                debug!(level = "cache", "Cache hit for {target}");
                return Some(entry.record.clone());
            }
        }
        self.entries
            .remove_if(&target, |_, entry| entry.expires_at <= now);
        None
    }

    pub fn insert(&self, target: TargetId, record: AttestationRecord) {
        let expires_at = Instant::now() + self.ttl;
        self.entries
            .insert(target, CacheEntry { record, expires_at });
    }

    pub fn invalidate(&self, target: TargetId) {
        self.entries.remove(&target);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of unexpired entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AttestationCache {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_CACHE_TTL)
    }
}
