//! Bounded, newest-first record of applied operations.

use std::collections::VecDeque;

use serde::Serialize;
use uuid::Uuid;

use crate::sync::Operation;

/// Default number of operations retained.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

// == Operation Source ==
/// Where an applied operation came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum OperationSource {
    Local,
    Remote {
        /// Connection the operation arrived on
        from_connection: String,
    },
}

// == History Entry ==
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Fresh per entry; distinct from the operation id
    pub id: Uuid,
    #[serde(flatten)]
    pub operation: Operation,
    #[serde(flatten)]
    pub source: OperationSource,
}

// == Sync History ==
#[derive(Debug)]
pub struct SyncHistory {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
}

impl SyncHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT)),
            limit,
        }
    }

    /// Records an operation at the front, dropping the oldest past the limit.
    pub fn record(&mut self, operation: Operation, source: OperationSource) {
        self.entries.push_front(HistoryEntry {
            id: Uuid::new_v4(),
            operation,
            source,
        });
        self.entries.truncate(self.limit);
    }

    /// Up to `limit` most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        self.entries.iter().take(limit).cloned().collect()
    }

    /// Timestamp of the newest recorded operation.
    pub fn last_timestamp(&self) -> Option<u64> {
        self.entries.front().map(|e| e.operation.timestamp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SyncHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
