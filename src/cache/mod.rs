//! Cache Module
//!
//! Provides in-memory caching with pluggable LRU or LFU eviction.

mod entry;
mod lfu;
mod lru;
mod policy;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use lfu::LfuCache;
pub use lru::LruCache;
pub use policy::{build_policy, EvictionPolicy, SnapshotEntry, Strategy};
pub use stats::{CacheMetrics, CacheStats};
pub use store::{CacheStore, SharedCache};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed serialized value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
