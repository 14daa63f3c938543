//! API Routes
//!
//! Configures the Axum router with all cache node endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    bulk_delete_handler, bulk_set_handler, clear_handler, delete_handler, get_handler,
    list_handler, metrics_handler, set_handler, simulate_failure_handler, strategy_handler,
    sync_force_handler, sync_history_handler, sync_request_handler, sync_status_handler,
    sync_toggle_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin, for the polling dashboard
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/cache",
            get(list_handler).post(set_handler).delete(clear_handler),
        )
        .route(
            "/api/cache/bulk",
            post(bulk_set_handler).delete(bulk_delete_handler),
        )
        .route("/api/cache/:key", get(get_handler).delete(delete_handler))
        .route("/api/strategy", post(strategy_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/sync/status", get(sync_status_handler))
        .route("/api/sync/history", get(sync_history_handler))
        .route("/api/sync/toggle", post(sync_toggle_handler))
        .route("/api/sync/force", post(sync_force_handler))
        .route("/api/sync/request", post(sync_request_handler))
        .route("/api/sync/simulate-failure", post(simulate_failure_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
