//! Peer connection records.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

// == Direction ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// This node dialed the peer and owns the retry.
    Outgoing,
    /// The peer dialed this node; it is never retried from here.
    Incoming,
}

// == Peer Status ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerStatus {
    Connecting,
    Connected,
    Disconnected,
}

// == Peer Key ==
/// Identifies one connection: the dialed address for outgoing peers, the
/// remote socket address for incoming ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerKey {
    pub direction: Direction,
    pub id: String,
}

impl PeerKey {
    pub fn outgoing(address: impl Into<String>) -> Self {
        Self {
            direction: Direction::Outgoing,
            id: address.into(),
        }
    }

    pub fn incoming(connection: impl Into<String>) -> Self {
        Self {
            direction: Direction::Incoming,
            id: connection.into(),
        }
    }
}

impl fmt::Display for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Outgoing => write!(f, "out:{}", self.id),
            Direction::Incoming => write!(f, "in:{}", self.id),
        }
    }
}

// == Peer Record ==
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerRecord {
    pub peer_id: String,
    /// Learned from the peer's `register-node`
    pub remote_node_id: Option<Uuid>,
    /// Unix milliseconds of the last snapshot or operation received
    pub last_sync: Option<u64>,
    pub direction: Direction,
    pub status: PeerStatus,
}

impl PeerRecord {
    pub fn new(key: &PeerKey, status: PeerStatus) -> Self {
        Self {
            peer_id: key.id.clone(),
            remote_node_id: None,
            last_sync: None,
            direction: key.direction,
            status,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == PeerStatus::Connected
    }
}
