//! Cache Store Module
//!
//! Main cache engine: key/value validation in front of a swappable eviction
//! policy.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::cache::{
    build_policy, CacheMetrics, EvictionPolicy, SnapshotEntry, Strategy, MAX_KEY_LENGTH,
    MAX_VALUE_SIZE,
};
use crate::error::{CacheError, Result};

/// Store handle shared between the HTTP layer and the replication manager.
pub type SharedCache = Arc<RwLock<CacheStore>>;

// == Cache Store ==
/// Capacity-bounded cache whose eviction policy can be switched at runtime.
#[derive(Debug)]
pub struct CacheStore {
    policy: Box<dyn EvictionPolicy>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store with the given strategy and capacity.
    pub fn new(strategy: Strategy, capacity: usize) -> Result<Self> {
        Ok(Self {
            policy: build_policy(strategy, capacity)?,
        })
    }

    /// Wraps the store for sharing across tasks.
    pub fn into_shared(self) -> SharedCache {
        Arc::new(RwLock::new(self))
    }

    // == Validate ==
    /// Checks a key/value pair before it reaches the policy.
    pub fn validate(key: &str, value: &Value) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        let size = serde_json::to_vec(value)
            .map_err(|e| CacheError::InvalidRequest(e.to_string()))?
            .len();
        if size > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }
        Ok(())
    }

    // == Get ==
    /// Retrieves a value by key. Counts a hit or miss and updates access state.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        self.policy.get(key)
    }

    // == Set ==
    /// Stores a key-value pair, evicting per policy when a new key arrives
    /// at full capacity.
    pub fn set(&mut self, key: String, value: Value) -> Result<()> {
        Self::validate(&key, &value)?;
        self.policy.set(key, value);
        Ok(())
    }

    // == Delete ==
    /// Removes an entry by key, returning whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.policy.delete(key)
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.policy.clear();
    }

    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        self.policy.snapshot()
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.policy.metrics()
    }

    pub fn strategy(&self) -> Strategy {
        self.policy.strategy()
    }

    pub fn capacity(&self) -> usize {
        self.policy.capacity()
    }

    pub fn len(&self) -> usize {
        self.policy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policy.is_empty()
    }

    // == Apply Snapshot ==
    /// Writes a batch of pairs through `set`, oldest-ranked first so the
    /// head of the batch ends up most recent. Invalid pairs are skipped.
    ///
    /// Returns the number of pairs applied.
    pub fn apply_snapshot<I>(&mut self, pairs: I) -> usize
    where
        I: IntoIterator<Item = (String, Value)>,
        I::IntoIter: DoubleEndedIterator,
    {
        let mut applied = 0;
        for (key, value) in pairs.into_iter().rev() {
            if Self::validate(&key, &value).is_ok() {
                self.policy.set(key, value);
                applied += 1;
            }
        }
        applied
    }

    // == Change Strategy ==
    /// Rebuilds the store under a new policy with the same capacity,
    /// replaying current entries. Recency/frequency state and counters reset.
    pub fn change_strategy(&mut self, strategy: Strategy) -> Result<()> {
        let mut next = build_policy(strategy, self.capacity())?;
        for entry in self.policy.snapshot().into_iter().rev() {
            next.set(entry.key, entry.value);
        }
        self.policy = next;
        Ok(())
    }
}
