use crate::types::{DateRange, LeaderboardSort, RankedEntry, ScopeKind};
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A thread-safe cache with TTL support.
pub struct Cache<K, V> {
    data: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<K: Eq + Hash, V: Clone> Cache<K, V> {
    /// Create a new cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            data: DashMap::new(),
            ttl,
        }
    }

    /// Get a live value. Expired entries are evicted on read.
    pub fn get(&self, key: &K) -> Option<V> {
        let entry = self.data.get(key)?;
        if entry.expires_at > Instant::now() {
            Some(entry.value.clone())
        } else {
            drop(entry);
            self.data.remove(key);
            None
        }
    }

    pub fn set(&self, key: K, value: V) {
        self.data.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.data.clear();
    }

    /// Number of entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Identifies one full ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RankingKey {
    pub scope: ScopeKind,
    pub range: DateRange,
    pub sort: LeaderboardSort,
}

/// Ranked rows per (scope, range, sort), before search and pagination.
pub type RankingCache = Cache<RankingKey, Arc<Vec<RankedEntry>>>;
