//! Read cache keyed by [`QueryKey`]

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use tokio::time::Instant;

use crate::polling::keys::QueryKey;

/// A cached read together with when it was fetched
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: Instant,
    /// Recommended delay before the next fetch
    pub refresh_after: Duration,
}

impl<T> CacheEntry<T> {
    pub fn is_stale(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) >= self.refresh_after
    }
}

/// In-memory read cache
pub struct ReadCache<T> {
    entries: RwLock<HashMap<QueryKey, CacheEntry<T>>>,
    capacity: usize,
}

impl<T: Clone> ReadCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &QueryKey) -> Option<CacheEntry<T>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    /// Store a fresh read
    pub fn insert(&self, key: QueryKey, value: T, refresh_after: Duration) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

        // Evict the oldest fetch when full
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.fetched_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                fetched_at: Instant::now(),
                refresh_after,
            },
        );
    }

    /// True when the key is missing or due for a re-fetch
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.get(key).is_none_or(|entry| entry.is_stale(Instant::now()))
    }

    /// Drop `key` and every key it is a prefix of. Returns how many were dropped.
    pub fn invalidate(&self, key: &QueryKey) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|cached, _| !cached.invalidated_by(key));
        before - entries.len()
    }

    /// Drop the unfiltered and every filtered log view of a deployment
    pub fn refresh_all_logs(&self, deploy_id: u64) -> usize {
        self.invalidate(&QueryKey::Logs(deploy_id))
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
