//! Request DTOs for the cache node API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::CacheStore;
use crate::error::{CacheError, Result};

/// Default number of history entries returned by `GET /api/sync/history`
pub const DEFAULT_HISTORY_PAGE: usize = 20;

/// Default outage length for `POST /api/sync/simulate-failure`
pub const DEFAULT_FAILURE_MS: u64 = 5000;

/// Request body for the SET operation (POST /api/cache)
///
/// A missing `key` deserializes as empty so it is reported as a validation
/// error rather than a malformed body.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    #[serde(default)]
    pub key: String,
    /// Any JSON value; absent means the request is invalid
    #[serde(default)]
    pub value: Option<Value>,
}

impl SetRequest {
    /// Validates the request and splits it into a key/value pair.
    pub fn into_parts(self) -> Result<(String, Value)> {
        let value = match self.value {
            Some(value) if !self.key.is_empty() => value,
            _ => {
                return Err(CacheError::InvalidRequest(
                    "Key and value are required".to_string(),
                ))
            }
        };
        CacheStore::validate(&self.key, &value)?;
        Ok((self.key, value))
    }
}

/// Request body for POST /api/cache/bulk
#[derive(Debug, Clone, Deserialize)]
pub struct BulkSetRequest {
    pub items: Vec<SetRequest>,
}

/// Request body for DELETE /api/cache/bulk
#[derive(Debug, Clone, Deserialize)]
pub struct BulkDeleteRequest {
    pub keys: Vec<String>,
}

/// Request body for POST /api/strategy
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyRequest {
    pub strategy: String,
}

/// Optional body for POST /api/sync/simulate-failure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulateFailureRequest {
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl SimulateFailureRequest {
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms.unwrap_or(DEFAULT_FAILURE_MS)
    }
}

/// Query string for GET /api/sync/history
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

impl HistoryQuery {
    /// Requested page size; zero or absent falls back to the default.
    pub fn limit(&self) -> usize {
        match self.limit {
            Some(0) | None => DEFAULT_HISTORY_PAGE,
            Some(limit) => limit,
        }
    }
}
