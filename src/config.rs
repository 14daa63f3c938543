//! Configuration Module
//!
//! Handles loading and managing node configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::Strategy;
use crate::sync::DEFAULT_HISTORY_LIMIT;

/// Node configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub capacity: usize,
    /// Initial eviction strategy
    pub strategy: Strategy,
    /// HTTP server port
    pub server_port: u16,
    /// Peer listener port
    pub peer_port: u16,
    /// Address peers use to reach this node; also used to skip self in `peers`
    pub advertised_address: String,
    /// Peer addresses to dial at startup
    pub peers: Vec<String>,
    /// Connection attempts per peer before giving up
    pub reconnect_attempts: u32,
    /// Initial delay between attempts in milliseconds, doubled per failure
    pub reconnect_delay_ms: u64,
    /// Bound on a single connection attempt in milliseconds
    pub connect_timeout_ms: u64,
    /// Number of operations kept in sync history
    pub history_limit: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cache entries (default: 100)
    /// - `CACHE_STRATEGY` - `LRU` or `LFU`, case-insensitive (default: LRU)
    /// - `SERVER_PORT` - HTTP server port (default: 5000)
    /// - `PEER_PORT` - Peer listener port (default: 6000)
    /// - `ADVERTISED_ADDRESS` - Address announced to peers (default: 127.0.0.1:PEER_PORT)
    /// - `PEER_NODES` - Comma-separated peer addresses (default: none)
    /// - `RECONNECT_ATTEMPTS` - Attempts per peer (default: 5)
    /// - `RECONNECT_DELAY_MS` - Initial retry delay (default: 1000)
    /// - `CONNECT_TIMEOUT_MS` - Per-attempt timeout (default: 5000)
    /// - `HISTORY_LIMIT` - Sync history size (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let peer_port = parse_var("PEER_PORT").unwrap_or(defaults.peer_port);

        Self {
            capacity: parse_var("CACHE_CAPACITY").unwrap_or(defaults.capacity),
            strategy: parse_var("CACHE_STRATEGY").unwrap_or(defaults.strategy),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            peer_port,
            advertised_address: env::var("ADVERTISED_ADDRESS")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| format!("127.0.0.1:{peer_port}")),
            peers: env::var("PEER_NODES")
                .map(|v| parse_peer_list(&v))
                .unwrap_or_default(),
            reconnect_attempts: parse_var("RECONNECT_ATTEMPTS")
                .unwrap_or(defaults.reconnect_attempts),
            reconnect_delay_ms: parse_var("RECONNECT_DELAY_MS")
                .unwrap_or(defaults.reconnect_delay_ms),
            connect_timeout_ms: parse_var("CONNECT_TIMEOUT_MS")
                .unwrap_or(defaults.connect_timeout_ms),
            history_limit: parse_var("HISTORY_LIMIT").unwrap_or(defaults.history_limit),
        }
    }

    /// Replication settings derived from this config.
    pub fn replication(&self) -> ReplicationConfig {
        ReplicationConfig {
            advertised_address: self.advertised_address.clone(),
            peers: self.peers.clone(),
            reconnect_attempts: self.reconnect_attempts,
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            history_limit: self.history_limit,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 100,
            strategy: Strategy::Lru,
            server_port: 5000,
            peer_port: 6000,
            advertised_address: "127.0.0.1:6000".to_string(),
            peers: Vec::new(),
            reconnect_attempts: 5,
            reconnect_delay_ms: 1000,
            connect_timeout_ms: 5000,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

// == Replication Config ==
/// Settings consumed by the replication manager and its connect tasks.
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    pub advertised_address: String,
    pub peers: Vec<String>,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    pub history_limit: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Config::default().replication()
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Splits a comma-separated peer list, dropping blanks.
fn parse_peer_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
