//! In-process alert dedupe backend.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use marketline_core::MarketResult;
use marketline_core::repository::DedupeCache;

/// Sharded map of key → claim expiry.
///
/// The entry API holds the shard lock across the check and the insert,
/// which makes [`acquire`](DedupeCache::acquire) atomic across tasks.
/// Clones share the same map. Not shared across processes; use the
/// SurrealDB backend for that.
#[derive(Debug, Clone, Default)]
pub struct MemoryDedupeCache {
    claims: Arc<DashMap<String, DateTime<Utc>>>,
}

impl MemoryDedupeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired claims; returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.claims.len();
        self.claims.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.claims.len())
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

impl DedupeCache for MemoryDedupeCache {
    async fn acquire(&self, key: &str, now: DateTime<Utc>, ttl: TimeDelta) -> MarketResult<bool> {
        let expires_at = now + ttl;
        let acquired = match self.claims.entry(key.to_string()) {
            Entry::Occupied(mut claim) if *claim.get() <= now => {
                claim.insert(expires_at);
                true
            }
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                true
            }
        };
        Ok(acquired)
    }
}
