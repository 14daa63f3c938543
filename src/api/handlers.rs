//! API Handlers
//!
//! HTTP request handlers for the cache and replication endpoints. Every
//! mutating handler keeps the store write lock until its broadcast is
//! queued, so peers receive local writes in the order they were applied.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::{CacheStore, SharedCache, Strategy};
use crate::config::{Config, ReplicationConfig};
use crate::error::{CacheError, Result};
use crate::models::{
    BulkDeleteRequest, BulkDeleteResponse, BulkSetRequest, BulkSetResponse, ClearResponse,
    DeleteResponse, GetResponse, HistoryQuery, HistoryResponse, ListResponse, MetricsResponse,
    ServerInfo, SetRequest, SetResponse, SimulateFailureRequest, StrategyRequest,
    StrategyResponse, SyncActionResponse, SyncToggleResponse,
};
use crate::sync::{OperationKind, ReplicationManager, ReplicationMetrics};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe cache store, shared with the replication manager
    pub cache: SharedCache,
    pub replication: Arc<ReplicationManager>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Creates a new AppState around the given store.
    pub fn new(cache: CacheStore, replication: ReplicationConfig) -> Self {
        let cache = cache.into_shared();
        let replication = Arc::new(ReplicationManager::new(cache.clone(), replication));
        Self {
            cache,
            replication,
            started_at: Utc::now(),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Fails when the configured capacity is invalid for the strategy.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = CacheStore::new(config.strategy, config.capacity)?;
        Ok(Self::new(cache, config.replication()))
    }
}

// == Cache Handlers ==

/// Handler for GET /api/cache/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    // Write lock: a read updates recency/frequency and stats
    let value = state.cache.write().await.get(&key);

    value
        .map(|value| Json(GetResponse::new(key.clone(), value)))
        .ok_or(CacheError::NotFound(key))
}

/// Handler for POST /api/cache
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    let (key, value) = req.into_parts()?;
    let mut cache = state.cache.write().await;
    cache.set(key.clone(), value.clone())?;

    let replicated = state
        .replication
        .broadcast(OperationKind::Set {
            key: key.clone(),
            value,
        })
        .await
        .is_some();
    drop(cache);

    Ok(Json(SetResponse::new(key, replicated)))
}

/// Handler for DELETE /api/cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let mut cache = state.cache.write().await;
    if !cache.delete(&key) {
        return Err(CacheError::NotFound(key));
    }

    state
        .replication
        .broadcast(OperationKind::Delete { key: key.clone() })
        .await;
    drop(cache);
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for DELETE /api/cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let mut cache = state.cache.write().await;
    cache.clear();
    state.replication.broadcast(OperationKind::Clear).await;
    drop(cache);
    Json(ClearResponse::new())
}

/// Handler for GET /api/cache
pub async fn list_handler(State(state): State<AppState>) -> Json<ListResponse> {
    let items = state.cache.read().await.snapshot();
    Json(ListResponse::new(items))
}

/// Handler for POST /api/cache/bulk
///
/// Items are applied independently; failures are reported per index.
pub async fn bulk_set_handler(
    State(state): State<AppState>,
    Json(req): Json<BulkSetRequest>,
) -> Json<BulkSetResponse> {
    let total_count = req.items.len();
    let mut success_count = 0;
    let mut errors = Vec::new();

    let mut cache = state.cache.write().await;
    for (index, item) in req.items.into_iter().enumerate() {
        let outcome = item
            .into_parts()
            .and_then(|(key, value)| cache.set(key.clone(), value.clone()).map(|_| (key, value)));
        match outcome {
            Ok((key, value)) => {
                success_count += 1;
                state
                    .replication
                    .broadcast(OperationKind::Set { key, value })
                    .await;
            }
            Err(err) => errors.push(format!("Item {}: {}", index, err)),
        }
    }
    drop(cache);

    Json(BulkSetResponse {
        message: "Bulk operation completed".to_string(),
        success_count,
        total_count,
        errors,
    })
}

/// Handler for DELETE /api/cache/bulk
pub async fn bulk_delete_handler(
    State(state): State<AppState>,
    Json(req): Json<BulkDeleteRequest>,
) -> Json<BulkDeleteResponse> {
    let total_count = req.keys.len();
    let mut deleted_count = 0;

    let mut cache = state.cache.write().await;
    for key in req.keys {
        if cache.delete(&key) {
            deleted_count += 1;
            state
                .replication
                .broadcast(OperationKind::Delete { key })
                .await;
        }
    }
    drop(cache);

    Json(BulkDeleteResponse {
        message: "Bulk delete completed".to_string(),
        deleted_count,
        total_count,
    })
}

/// Handler for POST /api/strategy
///
/// Rebuilds the local store under the new policy. Peers are told about the
/// change but keep their own policy.
pub async fn strategy_handler(
    State(state): State<AppState>,
    Json(req): Json<StrategyRequest>,
) -> Result<Json<StrategyResponse>> {
    let strategy: Strategy = req.strategy.parse()?;
    let mut cache = state.cache.write().await;
    cache.change_strategy(strategy)?;

    state
        .replication
        .broadcast(OperationKind::StrategyChange { strategy })
        .await;
    drop(cache);
    Ok(Json(StrategyResponse::new(strategy)))
}

/// Handler for GET /api/metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsResponse> {
    let cache = state.cache.read().await.metrics();
    let sync = state.replication.metrics().await;

    Json(MetricsResponse {
        cache,
        sync,
        server: ServerInfo::since(state.started_at),
    })
}

// == Sync Handlers ==

/// Handler for GET /api/sync/status
pub async fn sync_status_handler(State(state): State<AppState>) -> Json<ReplicationMetrics> {
    Json(state.replication.metrics().await)
}

/// Handler for GET /api/sync/history
pub async fn sync_history_handler(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let history = state.replication.history(query.limit()).await;
    Json(HistoryResponse::new(history))
}

/// Handler for POST /api/sync/toggle
pub async fn sync_toggle_handler(State(state): State<AppState>) -> Json<SyncToggleResponse> {
    let enabled = state.replication.toggle().await;
    Json(SyncToggleResponse::new(enabled))
}

/// Handler for POST /api/sync/force
pub async fn sync_force_handler(State(state): State<AppState>) -> Json<SyncActionResponse> {
    let peers = state.replication.force_sync().await;
    Json(SyncActionResponse::new("Force sync initiated", Some(peers)))
}

/// Handler for POST /api/sync/request
pub async fn sync_request_handler(State(state): State<AppState>) -> Json<SyncActionResponse> {
    let peers = state.replication.request_sync().await;
    Json(SyncActionResponse::new("Sync requested from peers", Some(peers)))
}

/// Handler for POST /api/sync/simulate-failure
///
/// The body is optional; without one the default outage length applies.
pub async fn simulate_failure_handler(
    State(state): State<AppState>,
    req: Option<Json<SimulateFailureRequest>>,
) -> Json<SyncActionResponse> {
    let duration_ms = req.map(|Json(r)| r).unwrap_or_default().duration_ms();
    debug!(duration_ms, "Failure simulation requested");

    state
        .replication
        .simulate_failure(Duration::from_millis(duration_ms))
        .await;
    Json(SyncActionResponse::new(
        format!("Replication suspended for {}ms", duration_ms),
        None,
    ))
}
