//! Response DTOs for the cache node API
//!
//! Defines the structure of outgoing HTTP response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheMetrics, SnapshotEntry, Strategy};
use crate::sync::{HistoryEntry, ReplicationMetrics};

/// Response body for GET /api/cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: Value,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for POST /api/cache
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
    /// Whether the write was broadcast to peers
    pub replicated: bool,
}

impl SetResponse {
    /// Creates a new SetResponse
    pub fn new(key: impl Into<String>, replicated: bool) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
            replicated,
        }
    }
}

/// Response body for DELETE /api/cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for DELETE /api/cache
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

impl ClearResponse {
    pub fn new() -> Self {
        Self {
            message: "Cache cleared successfully".to_string(),
        }
    }
}

impl Default for ClearResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Response body for GET /api/cache
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    /// Entries in eviction-policy order, most relevant first
    pub items: Vec<SnapshotEntry>,
    pub count: usize,
}

impl ListResponse {
    pub fn new(items: Vec<SnapshotEntry>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

/// Response body for POST /api/cache/bulk
#[derive(Debug, Clone, Serialize)]
pub struct BulkSetResponse {
    pub message: String,
    pub success_count: usize,
    pub total_count: usize,
    /// One message per rejected item, prefixed with its index
    pub errors: Vec<String>,
}

/// Response body for DELETE /api/cache/bulk
#[derive(Debug, Clone, Serialize)]
pub struct BulkDeleteResponse {
    pub message: String,
    pub deleted_count: usize,
    pub total_count: usize,
}

/// Response body for POST /api/strategy
#[derive(Debug, Clone, Serialize)]
pub struct StrategyResponse {
    pub message: String,
    pub strategy: Strategy,
}

impl StrategyResponse {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            message: format!("Strategy changed to {}", strategy),
            strategy,
        }
    }
}

/// Process section of the metrics response
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub started_at: DateTime<Utc>,
    /// Seconds since startup
    pub uptime_secs: i64,
    pub timestamp: DateTime<Utc>,
}

impl ServerInfo {
    pub fn since(started_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            started_at,
            uptime_secs: (now - started_at).num_seconds(),
            timestamp: now,
        }
    }
}

/// Response body for GET /api/metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    pub cache: CacheMetrics,
    pub sync: ReplicationMetrics,
    pub server: ServerInfo,
}

/// Response body for GET /api/sync/history
#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub count: usize,
    /// Newest first
    pub history: Vec<HistoryEntry>,
}

impl HistoryResponse {
    pub fn new(history: Vec<HistoryEntry>) -> Self {
        Self {
            count: history.len(),
            history,
        }
    }
}

/// Response body for POST /api/sync/toggle
#[derive(Debug, Clone, Serialize)]
pub struct SyncToggleResponse {
    pub sync_enabled: bool,
    pub message: String,
}

impl SyncToggleResponse {
    pub fn new(enabled: bool) -> Self {
        let state = if enabled { "enabled" } else { "disabled" };
        Self {
            sync_enabled: enabled,
            message: format!("Synchronization {}", state),
        }
    }
}

/// Response body for the sync actions (force, request, simulate-failure)
#[derive(Debug, Clone, Serialize)]
pub struct SyncActionResponse {
    pub message: String,
    /// Peers the action reached; absent for deferred actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peers: Option<usize>,
}

impl SyncActionResponse {
    pub fn new(message: impl Into<String>, peers: Option<usize>) -> Self {
        Self {
            message: message.into(),
            peers,
        }
    }
}
