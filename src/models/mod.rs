//! Request and Response models for the cache node API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{
    BulkDeleteRequest, BulkSetRequest, HistoryQuery, SetRequest, SimulateFailureRequest,
    StrategyRequest,
};
pub use responses::{
    BulkDeleteResponse, BulkSetResponse, ClearResponse, DeleteResponse, GetResponse,
    HistoryResponse, ListResponse, MetricsResponse, ServerInfo, SetResponse, StrategyResponse,
    SyncActionResponse, SyncToggleResponse,
};
