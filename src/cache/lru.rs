//! LRU Cache Module
//!
//! Least Recently Used store backed by an index-linked arena list.

use std::collections::HashMap;

use serde_json::Value;

use crate::cache::{CacheEntry, CacheMetrics, CacheStats, EvictionPolicy, SnapshotEntry, Strategy};
use crate::error::{CacheError, Result};

/// Sentinel slot before the most recently used entry.
const HEAD: usize = 0;
/// Sentinel slot after the least recently used entry.
const TAIL: usize = 1;

// == Slot ==
/// Arena node. Sentinels carry no entry; free slots carry no entry and are
/// unlinked.
#[derive(Debug)]
struct Slot {
    entry: Option<CacheEntry>,
    prev: usize,
    next: usize,
}

impl Slot {
    fn sentinel() -> Self {
        Self {
            entry: None,
            prev: HEAD,
            next: TAIL,
        }
    }
}

// == LRU Cache ==
/// Tracks access order for LRU eviction.
///
/// Slots are linked by index:
/// - `HEAD.next` = most recently used
/// - `TAIL.prev` = least recently used
#[derive(Debug)]
pub struct LruCache {
    capacity: usize,
    slots: Vec<Slot>,
    /// Released slot indices available for reuse
    free: Vec<usize>,
    index: HashMap<String, usize>,
    stats: CacheStats,
}

impl LruCache {
    // == Constructor ==
    /// Creates an empty LRU cache. A zero capacity is rejected.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CacheError::InvalidCapacity(capacity));
        }

        let mut cache = Self {
            capacity,
            slots: Vec::with_capacity(capacity + 2),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            stats: CacheStats::new(),
        };
        cache.reset_sentinels();
        Ok(cache)
    }

    fn reset_sentinels(&mut self) {
        self.slots.clear();
        self.slots.push(Slot::sentinel());
        self.slots.push(Slot::sentinel());
    }

    // == List Primitives ==
    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        self.slots[prev].next = next;
        self.slots[next].prev = prev;
    }

    fn attach_front(&mut self, idx: usize) {
        let first = self.slots[HEAD].next;
        self.slots[idx].prev = HEAD;
        self.slots[idx].next = first;
        self.slots[first].prev = idx;
        self.slots[HEAD].next = idx;
    }

    fn move_to_front(&mut self, idx: usize) {
        self.detach(idx);
        self.attach_front(idx);
    }

    fn allocate(&mut self, entry: CacheEntry) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx].entry = Some(entry);
                idx
            }
            None => {
                self.slots.push(Slot {
                    entry: Some(entry),
                    prev: HEAD,
                    next: TAIL,
                });
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) -> Option<CacheEntry> {
        self.free.push(idx);
        self.slots[idx].entry.take()
    }

    // == Evict Oldest ==
    /// Removes the least recently used entry, if any.
    fn evict_oldest(&mut self) -> Option<CacheEntry> {
        let idx = self.slots[TAIL].prev;
        if idx == HEAD {
            return None;
        }

        self.detach(idx);
        let entry = self.release(idx)?;
        self.index.remove(&entry.key);
        self.stats.record_eviction();
        Some(entry)
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.index.len());
        let mut idx = self.slots[HEAD].next;
        while idx != TAIL {
            if let Some(entry) = &self.slots[idx].entry {
                keys.push(entry.key.clone());
            }
            idx = self.slots[idx].next;
        }
        keys
    }

    /// Panics if the list and the index disagree.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let keys = self.keys_by_recency();
        assert_eq!(keys.len(), self.index.len(), "list length != index length");
        for key in &keys {
            let idx = self.index[key];
            let slot = &self.slots[idx];
            assert_eq!(slot.entry.as_ref().map(|e| e.key.as_str()), Some(key.as_str()));
            assert_eq!(self.slots[slot.prev].next, idx);
            assert_eq!(self.slots[slot.next].prev, idx);
        }
        assert!(self.index.len() <= self.capacity);
    }
}

impl EvictionPolicy for LruCache {
    // == Get ==
    fn get(&mut self, key: &str) -> Option<Value> {
        let Some(&idx) = self.index.get(key) else {
            self.stats.record_miss();
            return None;
        };

        self.stats.record_hit();
        self.move_to_front(idx);
        let entry = self.slots[idx].entry.as_mut()?;
        entry.touch();
        Some(entry.value.clone())
    }

    // == Set ==
    fn set(&mut self, key: String, value: Value) {
        if let Some(&idx) = self.index.get(&key) {
            if let Some(entry) = self.slots[idx].entry.as_mut() {
                entry.replace(value);
            }
            self.move_to_front(idx);
            return;
        }

        if self.index.len() >= self.capacity {
            self.evict_oldest();
        }

        let idx = self.allocate(CacheEntry::new(key.clone(), value));
        self.attach_front(idx);
        self.index.insert(key, idx);
    }

    // == Delete ==
    fn delete(&mut self, key: &str) -> bool {
        match self.index.remove(key) {
            Some(idx) => {
                self.detach(idx);
                self.release(idx);
                true
            }
            None => false,
        }
    }

    // == Clear ==
    fn clear(&mut self) {
        self.index.clear();
        self.free.clear();
        self.reset_sentinels();
        self.stats.reset();
    }

    // == Snapshot ==
    /// Entries by last access, newest first. Ties keep list order.
    fn snapshot(&self) -> Vec<SnapshotEntry> {
        let mut entries = Vec::with_capacity(self.index.len());
        let mut idx = self.slots[HEAD].next;
        while idx != TAIL {
            if let Some(entry) = &self.slots[idx].entry {
                entries.push(SnapshotEntry {
                    key: entry.key.clone(),
                    value: entry.value.clone(),
                    last_access: entry.last_access,
                    access_count: None,
                });
            }
            idx = self.slots[idx].next;
        }
        entries.sort_by(|a, b| b.last_access.cmp(&a.last_access));
        entries
    }

    fn metrics(&self) -> CacheMetrics {
        self.stats.metrics(Strategy::Lru, self.capacity, self.index.len())
    }

    fn strategy(&self) -> Strategy {
        Strategy::Lru
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}
