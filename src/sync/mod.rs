//! Sync Module
//!
//! Peer-to-peer replication: wire messages, operation history, the peer
//! roster and the manager tying them to the shared store.

mod history;
mod manager;
mod message;
mod operation;
mod peer;
mod transport;

pub use history::{HistoryEntry, OperationSource, SyncHistory, DEFAULT_HISTORY_LIMIT};
pub use manager::{ReplicationManager, ReplicationMetrics};
pub use message::{
    decode, read_frame, write_message, CacheSync, Frame, NodeInfo, Notification, PeerMessage,
    SyncEntry, MAX_FRAME_BYTES,
};
pub use operation::{Operation, OperationKind};
pub use peer::{Direction, PeerKey, PeerRecord, PeerStatus};
pub use transport::{run_session, serve_peers, PeerConnector, TcpConnector};
