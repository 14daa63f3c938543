//! Replicated operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::cache::{current_timestamp_ms, Strategy};

// == Operation Kind ==
/// The mutation carried by an [`Operation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OperationKind {
    Set { key: String, value: Value },
    Delete { key: String },
    Clear,
    /// Informational; receivers never switch policy because of it.
    StrategyChange { strategy: Strategy },
}

impl OperationKind {
    pub fn key(&self) -> Option<&str> {
        match self {
            OperationKind::Set { key, .. } | OperationKind::Delete { key } => Some(key),
            OperationKind::Clear | OperationKind::StrategyChange { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Set { .. } => "set",
            OperationKind::Delete { .. } => "delete",
            OperationKind::Clear => "clear",
            OperationKind::StrategyChange { .. } => "strategy-change",
        }
    }
}

// == Operation ==
/// Immutable record of one local mutation, broadcast to peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(flatten)]
    pub kind: OperationKind,
    pub origin_node_id: Uuid,
    /// Unix milliseconds at creation on the origin node
    pub timestamp: u64,
    pub operation_id: Uuid,
}

impl Operation {
    /// Stamps a mutation with its origin, the current time and a fresh id.
    pub fn new(kind: OperationKind, origin_node_id: Uuid) -> Self {
        Self {
            kind,
            origin_node_id,
            timestamp: current_timestamp_ms(),
            operation_id: Uuid::new_v4(),
        }
    }
}
