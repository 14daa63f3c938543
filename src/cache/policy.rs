//! Eviction Policy Module
//!
//! Common contract shared by the LRU and LFU stores, plus strategy selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{CacheMetrics, LfuCache, LruCache};
use crate::error::{CacheError, Result};

// == Strategy ==
/// Eviction strategy selectable at construction or at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Strategy {
    Lru,
    Lfu,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Lru => "LRU",
            Strategy::Lfu => "LFU",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LRU" => Ok(Strategy::Lru),
            "LFU" => Ok(Strategy::Lfu),
            other => Err(CacheError::InvalidRequest(format!(
                "Invalid strategy '{}'. Use LRU or LFU",
                other
            ))),
        }
    }
}

// == Snapshot Entry ==
/// One entry of a store snapshot, as shown to callers and sent to peers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEntry {
    pub key: String,
    pub value: Value,
    /// Unix milliseconds
    pub last_access: u64,
    /// Access frequency; only tracked by LFU
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_count: Option<u64>,
}

// == Eviction Policy Trait ==
/// A capacity-bounded key-value store with a specific eviction rule.
///
/// After any method returns, `len() <= capacity()` and the policy's index
/// structures agree with its entries.
pub trait EvictionPolicy: Send + Sync + fmt::Debug {
    /// Looks up a key, counting a hit or miss and updating access state.
    fn get(&mut self, key: &str) -> Option<Value>;

    /// Inserts or overwrites a key, evicting one entry when a new key
    /// arrives at full capacity.
    fn set(&mut self, key: String, value: Value);

    /// Removes a key, returning whether it existed.
    fn delete(&mut self, key: &str) -> bool;

    /// Drops every entry and zeroes the counters.
    fn clear(&mut self);

    /// Entries in policy order (most recent first for LRU, most frequent
    /// first for LFU).
    fn snapshot(&self) -> Vec<SnapshotEntry>;

    fn metrics(&self) -> CacheMetrics;

    fn strategy(&self) -> Strategy;

    fn capacity(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == Factory ==
/// Builds an empty store for the given strategy.
///
/// LRU rejects a zero capacity; LFU accepts it and ignores every `set`.
pub fn build_policy(strategy: Strategy, capacity: usize) -> Result<Box<dyn EvictionPolicy>> {
    match strategy {
        Strategy::Lru => Ok(Box::new(LruCache::new(capacity)?)),
        Strategy::Lfu => Ok(Box::new(LfuCache::new(capacity))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse_case_insensitive() {
        assert_eq!("lru".parse::<Strategy>().unwrap(), Strategy::Lru);
        assert_eq!(" LFU ".parse::<Strategy>().unwrap(), Strategy::Lfu);
        assert!(matches!(
            "fifo".parse::<Strategy>(),
            Err(CacheError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_strategy_serde() {
        assert_eq!(serde_json::to_string(&Strategy::Lfu).unwrap(), "\"LFU\"");
        let parsed: Strategy = serde_json::from_str("\"LRU\"").unwrap();
        assert_eq!(parsed, Strategy::Lru);
    }

    #[test]
    fn test_build_policy() {
        let lru = build_policy(Strategy::Lru, 4).unwrap();
        assert_eq!(lru.strategy(), Strategy::Lru);
        assert_eq!(lru.capacity(), 4);

        let lfu = build_policy(Strategy::Lfu, 0).unwrap();
        assert_eq!(lfu.strategy(), Strategy::Lfu);

        assert!(matches!(
            build_policy(Strategy::Lru, 0),
            Err(CacheError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn test_snapshot_entry_omits_missing_access_count() {
        let entry = SnapshotEntry {
            key: "k".into(),
            value: Value::from(1),
            last_access: 7,
            access_count: None,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("access_count"));
    }
}
