//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with access metadata.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

// == Cache Entry ==
/// Represents a single cache entry with value and access metadata.
///
/// Owned exclusively by an eviction policy; callers only ever see clones
/// of the value or a [`SnapshotEntry`](crate::cache::SnapshotEntry).
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The key this entry is stored under
    pub key: String,
    /// The stored value (opaque JSON payload)
    pub value: Value,
    /// Number of accesses, starting at 1 on insert
    pub frequency: u64,
    /// Last access timestamp (Unix milliseconds)
    pub last_access: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry at frequency 1, stamped with the current time.
    pub fn new(key: String, value: Value) -> Self {
        Self {
            key,
            value,
            frequency: 1,
            last_access: current_timestamp_ms(),
        }
    }

    // == Touch ==
    /// Refreshes the last access timestamp.
    pub fn touch(&mut self) {
        self.last_access = current_timestamp_ms();
    }

    // == Replace ==
    /// Overwrites the value and refreshes the timestamp.
    pub fn replace(&mut self, value: Value) {
        self.value = value;
        self.touch();
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
///
/// A clock set before the epoch reads as 0 rather than failing.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_entry_creation() {
        let before = current_timestamp_ms();
        let entry = CacheEntry::new("k".to_string(), json!("v"));

        assert_eq!(entry.key, "k");
        assert_eq!(entry.value, json!("v"));
        assert_eq!(entry.frequency, 1);
        assert!(entry.last_access >= before);
    }

    #[test]
    fn test_touch_advances_timestamp() {
        let mut entry = CacheEntry::new("k".to_string(), json!(1));
        let first = entry.last_access;

        sleep(Duration::from_millis(5));
        entry.touch();

        assert!(entry.last_access > first);
        assert_eq!(entry.frequency, 1, "touch does not count as a frequency bump");
    }

    #[test]
    fn test_replace_value() {
        let mut entry = CacheEntry::new("k".to_string(), json!({"a": 1}));
        entry.replace(json!([1, 2, 3]));

        assert_eq!(entry.value, json!([1, 2, 3]));
    }
}
