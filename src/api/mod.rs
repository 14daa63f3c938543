//! API Module
//!
//! HTTP handlers and routing for the cache node REST API.
//!
//! # Endpoints
//! - `GET|POST|DELETE /api/cache` - List, set, or clear entries
//! - `GET|DELETE /api/cache/:key` - Read or delete one key
//! - `POST|DELETE /api/cache/bulk` - Bulk set or delete
//! - `POST /api/strategy` - Switch eviction policy
//! - `GET /api/metrics` - Cache, replication and process metrics
//! - `/api/sync/*` - Replication status, history and controls

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
