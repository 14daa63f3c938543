//! Peer Cache - A distributed in-memory cache node
//!
//! Capacity-bounded key-value storage with LRU or LFU eviction, replicated
//! to peer nodes over persistent TCP connections.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod sync;
pub mod tasks;

pub use api::AppState;
pub use config::{Config, ReplicationConfig};
pub use error::{CacheError, Result};
pub use sync::ReplicationManager;
