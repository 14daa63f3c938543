//! LFU Cache Module
//!
//! Least Frequently Used store backed by frequency buckets.
//!
//! `min_frequency` is maintained lazily: it advances on the access path
//! when the minimum bucket empties, and is reset to 1 on every insert. A
//! `delete` that empties the minimum bucket leaves it stale. The stale value
//! is never consulted before the next insert resets it (a delete always
//! frees room, so the next new key cannot evict), and eviction recomputes
//! the minimum from the buckets if it ever finds the bucket missing.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::cache::{CacheEntry, CacheMetrics, CacheStats, EvictionPolicy, SnapshotEntry, Strategy};

// == LFU Cache ==
#[derive(Debug)]
pub struct LfuCache {
    capacity: usize,
    entries: HashMap<String, CacheEntry>,
    /// frequency -> keys currently at that frequency
    buckets: HashMap<u64, HashSet<String>>,
    min_frequency: u64,
    stats: CacheStats,
}

impl LfuCache {
    // == Constructor ==
    /// Creates an empty LFU cache. With a zero capacity every `set` is a no-op.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            buckets: HashMap::new(),
            min_frequency: 0,
            stats: CacheStats::new(),
        }
    }

    /// Current tracked minimum frequency (0 when empty after `clear`).
    pub fn min_frequency(&self) -> u64 {
        self.min_frequency
    }

    /// Access frequency of a key, without counting as an access.
    pub fn frequency(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|e| e.frequency)
    }

    // == Bucket Primitives ==
    /// Removes a key from its bucket, dropping the bucket once empty.
    /// Returns true if the bucket was dropped.
    fn unlink(&mut self, key: &str, frequency: u64) -> bool {
        let Some(bucket) = self.buckets.get_mut(&frequency) else {
            return false;
        };
        bucket.remove(key);
        if bucket.is_empty() {
            self.buckets.remove(&frequency);
            true
        } else {
            false
        }
    }

    fn link(&mut self, key: String, frequency: u64) {
        self.buckets.entry(frequency).or_default().insert(key);
    }

    // == Bump ==
    /// Moves a key from bucket `f` to `f + 1`, advancing the minimum when
    /// bucket `f` was the minimum and is now empty.
    fn bump(&mut self, key: &str) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        let old = entry.frequency;
        entry.frequency += 1;
        entry.touch();

        let emptied = self.unlink(key, old);
        self.link(key.to_string(), old + 1);
        if emptied && old == self.min_frequency {
            self.min_frequency = old + 1;
        }
    }

    // == Evict ==
    /// Removes one member of the minimum-frequency bucket.
    fn evict(&mut self) {
        let frequency = if self.buckets.contains_key(&self.min_frequency) {
            self.min_frequency
        } else {
            // O(buckets) scan; only reached with a stale `min_frequency`.
            match self.buckets.keys().min() {
                Some(&f) => {
                    self.min_frequency = f;
                    f
                }
                None => return,
            }
        };

        let victim = self
            .buckets
            .get(&frequency)
            .and_then(|bucket| bucket.iter().next().cloned());

        if let Some(key) = victim {
            self.unlink(&key, frequency);
            self.entries.remove(&key);
            self.stats.record_eviction();
        }
    }

    /// Panics if buckets and entries disagree.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let bucketed: usize = self.buckets.values().map(HashSet::len).sum();
        assert_eq!(bucketed, self.entries.len(), "bucket members != entries");
        for (frequency, bucket) in &self.buckets {
            assert!(!bucket.is_empty(), "empty bucket {frequency} kept");
            for key in bucket {
                assert_eq!(self.entries[key].frequency, *frequency);
            }
        }
        assert!(self.entries.len() <= self.capacity);
    }
}

impl EvictionPolicy for LfuCache {
    // == Get ==
    fn get(&mut self, key: &str) -> Option<Value> {
        if !self.entries.contains_key(key) {
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        self.bump(key);
        self.entries.get(key).map(|e| e.value.clone())
    }

    // == Set ==
    fn set(&mut self, key: String, value: Value) {
        if self.capacity == 0 {
            return;
        }

        if let Some(entry) = self.entries.get_mut(&key) {
            entry.replace(value);
            self.bump(&key);
            return;
        }

        if self.entries.len() >= self.capacity {
            self.evict();
        }

        self.link(key.clone(), 1);
        self.entries.insert(key.clone(), CacheEntry::new(key, value));
        self.min_frequency = 1;
    }

    // == Delete ==
    fn delete(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.unlink(key, entry.frequency);
                true
            }
            None => false,
        }
    }

    // == Clear ==
    fn clear(&mut self) {
        self.entries.clear();
        self.buckets.clear();
        self.min_frequency = 0;
        self.stats.reset();
    }

    // == Snapshot ==
    /// Entries by frequency, highest first; equal frequencies by key.
    fn snapshot(&self) -> Vec<SnapshotEntry> {
        let mut entries: Vec<SnapshotEntry> = self
            .entries
            .values()
            .map(|entry| SnapshotEntry {
                key: entry.key.clone(),
                value: entry.value.clone(),
                last_access: entry.last_access,
                access_count: Some(entry.frequency),
            })
            .collect();
        entries.sort_by(|a, b| {
            b.access_count
                .cmp(&a.access_count)
                .then_with(|| a.key.cmp(&b.key))
        });
        entries
    }

    fn metrics(&self) -> CacheMetrics {
        self.stats.metrics(Strategy::Lfu, self.capacity, self.entries.len())
    }

    fn strategy(&self) -> Strategy {
        Strategy::Lfu
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
