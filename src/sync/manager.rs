//! Replication Manager
//!
//! Owns node identity, the peer roster and sync history. Local mutations are
//! broadcast as [`Operation`]s; operations and snapshots from peers are
//! applied to the shared store.
//!
//! # Consistency
//! - Last write wins by arrival; no clocks are compared.
//! - Operations are applied only by direct peers of their origin and never
//!   relayed, so nodes that are not directly connected converge through
//!   full syncs.
//! - Operations whose origin is this node are discarded, so cycles in the
//!   peer graph cannot re-apply a local mutation.
//!
//! # Locking
//! Lock order is store, then manager state. Callers that mutate the store
//! or take a snapshot keep the store locked until the resulting message is
//! queued, so peers see local changes in the order they were applied. No
//! path waits on the store while holding the state lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::cache::{current_timestamp_ms, CacheStore, SharedCache};
use crate::config::ReplicationConfig;
use crate::error::Result;
use crate::sync::{
    CacheSync, Direction, HistoryEntry, NodeInfo, Notification, Operation, OperationKind,
    OperationSource, PeerConnector, PeerKey, PeerMessage, PeerRecord, PeerStatus, SyncEntry,
    SyncHistory,
};
use crate::tasks::{spawn_connect_task, spawn_recovery_task};

/// Buffered notifications before slow subscribers start lagging.
const NOTIFICATION_CAPACITY: usize = 64;

// == Replication Metrics ==
#[derive(Debug, Clone, Serialize)]
pub struct ReplicationMetrics {
    pub node_id: Uuid,
    /// Connected peers across both directions
    pub connected_peers: usize,
    pub replication_enabled: bool,
    pub total_operations: usize,
    pub last_operation_at: Option<u64>,
    pub peers: Vec<PeerRecord>,
}

// == Peer Link ==
/// Roster entry plus the outbound queue of a live connection.
#[derive(Debug)]
struct PeerLink {
    record: PeerRecord,
    sender: Option<mpsc::UnboundedSender<PeerMessage>>,
    writer: Option<JoinHandle<()>>,
}

impl PeerLink {
    fn pending(key: &PeerKey) -> Self {
        Self {
            record: PeerRecord::new(key, PeerStatus::Connecting),
            sender: None,
            writer: None,
        }
    }

    /// Queues a message; false if the link has no live writer.
    fn send(&self, message: PeerMessage) -> bool {
        match &self.sender {
            Some(sender) if self.record.is_connected() => sender.send(message).is_ok(),
            _ => false,
        }
    }

    fn close(self) {
        if let Some(writer) = self.writer {
            writer.abort();
        }
    }
}

// == Replication State ==
#[derive(Debug)]
struct ReplicationState {
    enabled: bool,
    history: SyncHistory,
    peers: HashMap<PeerKey, PeerLink>,
    connect_tasks: HashMap<String, JoinHandle<()>>,
    recovery_task: Option<JoinHandle<()>>,
}

impl ReplicationState {
    fn new(history_limit: usize) -> Self {
        Self {
            enabled: true,
            history: SyncHistory::new(history_limit),
            peers: HashMap::new(),
            connect_tasks: HashMap::new(),
            recovery_task: None,
        }
    }

    /// Fans a message out to every connected peer. Each send fails
    /// independently. Returns the number of peers it was queued for.
    fn send_all(&self, message: &PeerMessage) -> usize {
        let mut delivered = 0;
        for (key, link) in &self.peers {
            if !link.record.is_connected() {
                continue;
            }
            if link.send(message.clone()) {
                delivered += 1;
            } else {
                warn!(peer = %key, message = message.name(), "failed to queue message for peer");
            }
        }
        delivered
    }

    fn roster(&self) -> Vec<PeerRecord> {
        let mut peers: Vec<PeerRecord> = self.peers.values().map(|l| l.record.clone()).collect();
        peers.sort_by(|a, b| {
            (a.direction == Direction::Incoming, &a.peer_id)
                .cmp(&(b.direction == Direction::Incoming, &b.peer_id))
        });
        peers
    }

    fn connected_count(&self) -> usize {
        self.peers.values().filter(|l| l.record.is_connected()).count()
    }
}

// == Replication Manager ==
#[derive(Debug)]
pub struct ReplicationManager {
    node_id: Uuid,
    config: ReplicationConfig,
    cache: SharedCache,
    state: Mutex<ReplicationState>,
    notifier: broadcast::Sender<Notification>,
}

impl ReplicationManager {
    // == Constructor ==
    /// Creates a manager with a fresh node id. Replication starts enabled.
    pub fn new(cache: SharedCache, config: ReplicationConfig) -> Self {
        let node_id = Uuid::new_v4();
        let (notifier, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        info!(
            %node_id,
            address = %config.advertised_address,
            peers = ?config.peers,
            "Replication manager initialized"
        );

        Self {
            node_id,
            state: Mutex::new(ReplicationState::new(config.history_limit)),
            config,
            cache,
            notifier,
        }
    }

    pub fn node_id(&self) -> Uuid {
        self.node_id
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn node_info(&self) -> NodeInfo {
        NodeInfo {
            node_id: self.node_id,
            advertised_address: self.config.advertised_address.clone(),
        }
    }

    /// Subscribes to peer-list and sync-status notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    // == Peer Bootstrap ==
    /// Starts a connect task for every configured peer that is neither this
    /// node nor already being dialed. Peers whose retries were exhausted are
    /// dialed again. Returns the number of tasks started.
    pub async fn connect_to_peers<C: PeerConnector>(self: &Arc<Self>, connector: Arc<C>) -> usize {
        let mut state = self.state.lock().await;
        let mut started = 0;

        for address in &self.config.peers {
            let address = address.trim();
            if address.is_empty() || address == self.config.advertised_address {
                debug!(peer = %address, "Skipping peer (self or empty)");
                continue;
            }
            if state
                .connect_tasks
                .get(address)
                .is_some_and(|task| !task.is_finished())
            {
                debug!(peer = %address, "Skipping peer (already connecting)");
                continue;
            }

            let key = PeerKey::outgoing(address);
            state.peers.insert(key.clone(), PeerLink::pending(&key));
            let task = spawn_connect_task(Arc::clone(self), Arc::clone(&connector), address.to_string());
            state.connect_tasks.insert(address.to_string(), task);
            started += 1;
        }

        started
    }

    /// Marks an outgoing peer as being dialed.
    pub(crate) async fn mark_connecting(&self, address: &str) {
        let key = PeerKey::outgoing(address);
        let mut state = self.state.lock().await;
        let link = state
            .peers
            .entry(key.clone())
            .or_insert_with(|| PeerLink::pending(&key));
        link.record.status = PeerStatus::Connecting;
    }

    /// Settles an outgoing peer in `Disconnected` once its attempts are spent.
    pub(crate) async fn mark_exhausted(&self, address: &str) {
        let key = PeerKey::outgoing(address);
        {
            let mut state = self.state.lock().await;
            let link = state
                .peers
                .entry(key.clone())
                .or_insert_with(|| PeerLink::pending(&key));
            link.record.status = PeerStatus::Disconnected;
            link.sender = None;
        }
        self.notify_node_list().await;
    }

    // == Connection Lifecycle ==
    /// Registers a live connection. Outgoing connections announce this node
    /// immediately.
    pub async fn attach(
        &self,
        key: PeerKey,
        sender: mpsc::UnboundedSender<PeerMessage>,
        writer: JoinHandle<()>,
    ) {
        {
            let mut state = self.state.lock().await;
            let link = state
                .peers
                .entry(key.clone())
                .or_insert_with(|| PeerLink::pending(&key));
            link.record.status = PeerStatus::Connected;
            link.sender = Some(sender);
            if let Some(previous) = link.writer.replace(writer) {
                previous.abort();
            }
            if key.direction == Direction::Outgoing {
                link.send(PeerMessage::RegisterNode(self.node_info()));
            }
        }

        info!(peer = %key, "Peer connected");
        self.notify_node_list().await;
    }

    /// Drops a connection from the roster.
    pub async fn detach(&self, key: &PeerKey) {
        let removed = self.state.lock().await.peers.remove(key);
        if let Some(link) = removed {
            link.close();
            info!(peer = %key, "Peer disconnected");
            self.notify_node_list().await;
        }
    }

    // == Inbound Dispatch ==
    /// Routes one decoded message from a connection. Never fails: problems
    /// are logged and the message dropped.
    pub async fn handle_message(&self, from: &PeerKey, message: PeerMessage) {
        trace!(peer = %from, message = message.name(), "Peer message received");
        match message {
            PeerMessage::RegisterNode(info) => self.handle_register(from, info).await,
            PeerMessage::CacheSync(sync) => self.apply_full_sync(from, sync).await,
            PeerMessage::CacheOperation(operation) => {
                self.apply_remote(from, operation).await;
            }
            PeerMessage::RequestSync => {
                let cache = self.cache.read().await;
                self.send_to(from, self.snapshot_message(&cache)).await;
            }
        }
    }

    /// Records the peer's identity and sends it our snapshot. The accepting
    /// side also answers with its own identity, which prompts the dialing
    /// side to send its snapshot back.
    async fn handle_register(&self, from: &PeerKey, info: NodeInfo) {
        if info.node_id == self.node_id {
            warn!(peer = %from, "Peer registered with this node's own id; ignoring");
            return;
        }

        {
            let cache = self.cache.read().await;
            let mut state = self.state.lock().await;
            let Some(link) = state.peers.get_mut(from) else {
                return;
            };
            link.record.remote_node_id = Some(info.node_id);
            if from.direction == Direction::Incoming {
                link.send(PeerMessage::RegisterNode(self.node_info()));
            }
            link.send(self.snapshot_message(&cache));
        }

        info!(
            peer = %from,
            remote_node_id = %info.node_id,
            remote_address = %info.advertised_address,
            "Peer registered"
        );
        self.notify_node_list().await;
    }

    // == Full Sync ==
    /// Applies a peer's snapshot through `set`. Snapshots tagged with this
    /// node's id are ignored.
    pub async fn apply_full_sync(&self, from: &PeerKey, sync: CacheSync) {
        if sync.origin_node_id == self.node_id {
            debug!(peer = %from, "Ignoring own snapshot");
            return;
        }

        let received = sync.entries.len();
        let applied = self
            .cache
            .write()
            .await
            .apply_snapshot(sync.entries.into_iter().map(|e| (e.key, e.value)));
        if applied < received {
            warn!(peer = %from, skipped = received - applied, "Skipped invalid snapshot entries");
        }

        self.touch_peer(from, Some(sync.origin_node_id)).await;
        info!(peer = %from, origin = %sync.origin_node_id, applied, "Full sync applied");
        self.notify_node_list().await;
    }

    // == Remote Operation ==
    /// Applies a peer's operation. Returns false when it was discarded,
    /// either as this node's own echo or because it could not be applied.
    pub async fn apply_remote(&self, from: &PeerKey, operation: Operation) -> bool {
        if operation.origin_node_id == self.node_id {
            debug!(peer = %from, operation_id = %operation.operation_id, "Discarding own operation echo");
            return false;
        }

        if let Err(err) = self.apply_to_store(&operation.kind).await {
            warn!(
                peer = %from,
                operation = operation.kind.name(),
                operation_id = %operation.operation_id,
                error = %err,
                "Dropping remote operation"
            );
            return false;
        }

        let origin = operation.origin_node_id;
        self.state.lock().await.history.record(
            operation,
            OperationSource::Remote {
                from_connection: from.id.clone(),
            },
        );
        self.touch_peer(from, Some(origin)).await;
        true
    }

    async fn apply_to_store(&self, kind: &OperationKind) -> Result<()> {
        let mut cache = self.cache.write().await;
        match kind {
            OperationKind::Set { key, value } => cache.set(key.clone(), value.clone())?,
            OperationKind::Delete { key } => {
                cache.delete(key);
            }
            OperationKind::Clear => cache.clear(),
            OperationKind::StrategyChange { strategy } => {
                debug!(%strategy, "Peer changed strategy; keeping local policy");
            }
        }
        Ok(())
    }

    /// Stamps a peer's last sync time, learning its node id if still unknown.
    async fn touch_peer(&self, key: &PeerKey, node_id: Option<Uuid>) {
        let mut state = self.state.lock().await;
        if let Some(link) = state.peers.get_mut(key) {
            link.record.last_sync = Some(current_timestamp_ms());
            if link.record.remote_node_id.is_none() {
                link.record.remote_node_id = node_id;
            }
        }
    }

    // == Broadcast ==
    /// Broadcasts a local mutation to every connected peer and records it.
    /// Returns `None` without side effects while replication is disabled.
    pub async fn broadcast(&self, kind: OperationKind) -> Option<Operation> {
        let mut state = self.state.lock().await;
        if !state.enabled {
            debug!(operation = kind.name(), "Replication disabled; not broadcasting");
            return None;
        }

        let operation = Operation::new(kind, self.node_id);
        let delivered = state.send_all(&PeerMessage::CacheOperation(operation.clone()));
        state.history.record(operation.clone(), OperationSource::Local);
        debug!(
            operation = operation.kind.name(),
            operation_id = %operation.operation_id,
            peers = delivered,
            "Operation broadcast"
        );
        Some(operation)
    }

    // == Forced Sync ==
    /// Sends the full current snapshot to every connected peer.
    pub async fn force_sync(&self) -> usize {
        let cache = self.cache.read().await;
        let snapshot = self.snapshot_message(&cache);
        let delivered = self.state.lock().await.send_all(&snapshot);
        drop(cache);
        info!(peers = delivered, "Forced full sync");
        delivered
    }

    /// Asks every connected peer for its snapshot.
    pub async fn request_sync(&self) -> usize {
        self.state.lock().await.send_all(&PeerMessage::RequestSync)
    }

    // == Enable / Disable ==
    pub async fn is_enabled(&self) -> bool {
        self.state.lock().await.enabled
    }

    /// Sets the replication flag, notifying subscribers on change. Enabling
    /// does not resync by itself.
    pub async fn set_enabled(&self, enabled: bool) -> bool {
        let changed = {
            let mut state = self.state.lock().await;
            let changed = state.enabled != enabled;
            state.enabled = enabled;
            changed
        };

        if changed {
            info!(enabled, "Replication status changed");
            let _ = self.notifier.send(Notification::SyncStatusChange {
                enabled,
                node_id: self.node_id,
            });
        }
        enabled
    }

    /// Flips the replication flag, returning the new value.
    pub async fn toggle(&self) -> bool {
        let current = self.is_enabled().await;
        self.set_enabled(!current).await
    }

    // == Failure Simulation ==
    /// Suspends outbound replication for `duration`, then re-enables it and
    /// forces a full resync. A new call replaces a pending recovery.
    pub async fn simulate_failure(self: &Arc<Self>, duration: Duration) {
        self.set_enabled(false).await;
        let task = spawn_recovery_task(Arc::clone(self), duration);
        if let Some(previous) = self.state.lock().await.recovery_task.replace(task) {
            previous.abort();
        }
        warn!(duration_ms = duration.as_millis() as u64, "Simulating node failure");
    }

    // == Introspection ==
    /// Up to `limit` history entries, newest first.
    pub async fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.state.lock().await.history.recent(limit)
    }

    pub async fn peers(&self) -> Vec<PeerRecord> {
        self.state.lock().await.roster()
    }

    pub async fn metrics(&self) -> ReplicationMetrics {
        let state = self.state.lock().await;
        ReplicationMetrics {
            node_id: self.node_id,
            connected_peers: state.connected_count(),
            replication_enabled: state.enabled,
            total_operations: state.history.len(),
            last_operation_at: state.history.last_timestamp(),
            peers: state.roster(),
        }
    }

    // == Shutdown ==
    /// Cancels connect and recovery tasks and closes every peer writer.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        for (_, task) in state.connect_tasks.drain() {
            task.abort();
        }
        if let Some(task) = state.recovery_task.take() {
            task.abort();
        }
        for (_, link) in state.peers.drain() {
            link.close();
        }
        info!(node_id = %self.node_id, "Replication manager shut down");
    }

    // == Helpers ==
    /// Callers keep `cache` locked until the message is queued, so no local
    /// broadcast can slip in between the snapshot and its delivery.
    fn snapshot_message(&self, cache: &CacheStore) -> PeerMessage {
        let entries = cache
            .snapshot()
            .into_iter()
            .map(|e| SyncEntry {
                key: e.key,
                value: e.value,
            })
            .collect();

        PeerMessage::CacheSync(CacheSync {
            origin_node_id: self.node_id,
            timestamp: current_timestamp_ms(),
            entries,
        })
    }

    async fn send_to(&self, key: &PeerKey, message: PeerMessage) {
        let state = self.state.lock().await;
        match state.peers.get(key) {
            Some(link) if link.send(message) => {}
            _ => warn!(peer = %key, "Peer not connected; message dropped"),
        }
    }

    async fn notify_node_list(&self) {
        let (peers, connected) = {
            let state = self.state.lock().await;
            (state.roster(), state.connected_count())
        };
        // Err only means nobody is subscribed.
        let _ = self.notifier.send(Notification::NodeListUpdate {
            peers,
            total_count: connected + 1,
            self_id: self.node_id,
        });
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, Strategy};
    use serde_json::json;

    fn manager() -> ReplicationManager {
        let cache = CacheStore::new(Strategy::Lru, 16).unwrap().into_shared();
        ReplicationManager::new(cache, ReplicationConfig::default())
    }

    /// Attaches a fake connection and returns its outbound queue.
    async fn connect_fake(
        manager: &ReplicationManager,
        key: PeerKey,
    ) -> mpsc::UnboundedReceiver<PeerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        manager.attach(key, tx, tokio::spawn(async {})).await;
        rx
    }

    fn remote_op(kind: OperationKind) -> Operation {
        Operation::new(kind, Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_node_ids_are_unique() {
        assert_ne!(manager().node_id(), manager().node_id());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_both_directions() {
        let manager = manager();
        let mut out = connect_fake(&manager, PeerKey::outgoing("b:6000")).await;
        let mut inc = connect_fake(&manager, PeerKey::incoming("c:5555")).await;
        // Outgoing links announce themselves first.
        assert!(matches!(out.recv().await, Some(PeerMessage::RegisterNode(_))));

        let op = manager
            .broadcast(OperationKind::Set {
                key: "k".into(),
                value: json!(1),
            })
            .await
            .unwrap();

        assert_eq!(op.origin_node_id, manager.node_id());
        assert_eq!(out.recv().await, Some(PeerMessage::CacheOperation(op.clone())));
        assert_eq!(inc.recv().await, Some(PeerMessage::CacheOperation(op.clone())));

        let history = manager.history(10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].source, OperationSource::Local);
    }

    #[tokio::test]
    async fn test_broadcast_survives_dead_peer() {
        let manager = manager();
        let dead = connect_fake(&manager, PeerKey::incoming("dead:1")).await;
        drop(dead);
        let mut live = connect_fake(&manager, PeerKey::incoming("live:1")).await;

        manager.broadcast(OperationKind::Clear).await.unwrap();
        assert!(matches!(live.recv().await, Some(PeerMessage::CacheOperation(_))));
    }

    #[tokio::test]
    async fn test_disabled_broadcast_is_silent() {
        let manager = manager();
        let mut inc = connect_fake(&manager, PeerKey::incoming("c:1")).await;
        let mut notes = manager.subscribe();

        assert!(!manager.toggle().await);
        assert_eq!(
            notes.recv().await.unwrap(),
            Notification::SyncStatusChange {
                enabled: false,
                node_id: manager.node_id()
            }
        );
        assert!(manager.broadcast(OperationKind::Clear).await.is_none());
        assert!(inc.try_recv().is_err());
        assert!(manager.history(10).await.is_empty());

        assert!(manager.toggle().await);
        assert!(inc.try_recv().is_err(), "re-enabling does not resync");
    }

    #[tokio::test]
    async fn test_apply_remote_dispatch() {
        let manager = manager();
        let from = PeerKey::incoming("peer:1");

        assert!(
            manager
                .apply_remote(
                    &from,
                    remote_op(OperationKind::Set {
                        key: "a".into(),
                        value: json!("x")
                    })
                )
                .await
        );
        assert_eq!(manager.cache().write().await.get("a"), Some(json!("x")));

        manager
            .apply_remote(&from, remote_op(OperationKind::Delete { key: "a".into() }))
            .await;
        assert_eq!(manager.cache().write().await.get("a"), None);

        manager
            .apply_remote(
                &from,
                remote_op(OperationKind::Set {
                    key: "b".into(),
                    value: json!(2),
                }),
            )
            .await;
        manager.apply_remote(&from, remote_op(OperationKind::Clear)).await;
        assert!(manager.cache().read().await.is_empty());

        manager
            .apply_remote(
                &from,
                remote_op(OperationKind::StrategyChange {
                    strategy: Strategy::Lfu,
                }),
            )
            .await;
        assert_eq!(manager.cache().read().await.strategy(), Strategy::Lru);

        let history = manager.history(10).await;
        assert_eq!(history.len(), 5);
        assert_eq!(
            history[0].source,
            OperationSource::Remote {
                from_connection: "peer:1".into()
            }
        );
    }

    #[tokio::test]
    async fn test_own_echo_is_discarded() {
        let manager = manager();
        let from = PeerKey::outgoing("cycle:1");
        manager
            .cache()
            .write()
            .await
            .set("k".into(), json!("original"))
            .unwrap();

        for _ in 0..5 {
            let echo = Operation::new(
                OperationKind::Set {
                    key: "k".into(),
                    value: json!("echo"),
                },
                manager.node_id(),
            );
            assert!(!manager.apply_remote(&from, echo).await);
        }
        let echo_clear = Operation::new(OperationKind::Clear, manager.node_id());
        assert!(!manager.apply_remote(&from, echo_clear).await);

        assert_eq!(manager.cache().write().await.get("k"), Some(json!("original")));
        assert!(manager.history(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_remote_operation_is_dropped() {
        let manager = manager();
        let from = PeerKey::incoming("peer:1");
        let bad = remote_op(OperationKind::Set {
            key: String::new(),
            value: json!(1),
        });

        assert!(!manager.apply_remote(&from, bad).await);
        assert!(manager.cache().read().await.is_empty());
        assert!(manager.history(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_history_bound_across_sources() {
        let manager = manager();
        let from = PeerKey::incoming("peer:1");
        for i in 0..60 {
            manager.broadcast(OperationKind::Delete { key: format!("l{i}") }).await;
            manager
                .apply_remote(&from, remote_op(OperationKind::Delete { key: format!("r{i}") }))
                .await;
        }

        let history = manager.history(usize::MAX).await;
        assert_eq!(history.len(), 100);
        assert_eq!(history[0].operation.kind.key(), Some("r59"));
        assert_eq!(history[1].operation.kind.key(), Some("l59"));
        assert_eq!(history[99].operation.kind.key(), Some("l10"));
    }

    #[tokio::test]
    async fn test_register_handshake_from_incoming() {
        let manager = manager();
        manager.cache().write().await.set("seed".into(), json!(1)).unwrap();
        let key = PeerKey::incoming("peer:1");
        let mut rx = connect_fake(&manager, key.clone()).await;
        let remote = Uuid::new_v4();

        manager
            .handle_message(
                &key,
                PeerMessage::RegisterNode(NodeInfo {
                    node_id: remote,
                    advertised_address: "peer:6000".into(),
                }),
            )
            .await;

        match rx.recv().await {
            Some(PeerMessage::RegisterNode(info)) => assert_eq!(info.node_id, manager.node_id()),
            other => panic!("expected register-node, got {other:?}"),
        }
        match rx.recv().await {
            Some(PeerMessage::CacheSync(sync)) => {
                assert_eq!(sync.origin_node_id, manager.node_id());
                assert_eq!(sync.entries.len(), 1);
                assert_eq!(sync.entries[0].key, "seed");
            }
            other => panic!("expected cache-sync, got {other:?}"),
        }

        let peers = manager.peers().await;
        assert_eq!(peers[0].remote_node_id, Some(remote));
    }

    #[tokio::test]
    async fn test_register_from_outgoing_sends_only_snapshot() {
        let manager = manager();
        let key = PeerKey::outgoing("peer:6000");
        let mut rx = connect_fake(&manager, key.clone()).await;
        assert!(matches!(rx.recv().await, Some(PeerMessage::RegisterNode(_))));

        manager
            .handle_message(
                &key,
                PeerMessage::RegisterNode(NodeInfo {
                    node_id: Uuid::new_v4(),
                    advertised_address: "peer:6000".into(),
                }),
            )
            .await;

        assert!(matches!(rx.recv().await, Some(PeerMessage::CacheSync(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_sync_applies_and_ignores_self() {
        let manager = manager();
        let key = PeerKey::incoming("peer:1");
        let _rx = connect_fake(&manager, key.clone()).await;

        let own = CacheSync {
            origin_node_id: manager.node_id(),
            timestamp: 0,
            entries: vec![SyncEntry {
                key: "mine".into(),
                value: json!(0),
            }],
        };
        manager.apply_full_sync(&key, own).await;
        assert!(manager.cache().read().await.is_empty());

        let theirs = CacheSync {
            origin_node_id: Uuid::new_v4(),
            timestamp: 0,
            entries: vec![
                SyncEntry {
                    key: "a".into(),
                    value: json!(1),
                },
                SyncEntry {
                    key: "b".into(),
                    value: json!(2),
                },
            ],
        };
        manager.apply_full_sync(&key, theirs).await;
        assert_eq!(manager.cache().write().await.get("a"), Some(json!(1)));
        assert_eq!(manager.cache().write().await.get("b"), Some(json!(2)));
        assert!(manager.peers().await[0].last_sync.is_some());
    }

    #[tokio::test]
    async fn test_request_sync_answers_on_same_connection() {
        let manager = manager();
        let asking = PeerKey::incoming("asking:1");
        let other = PeerKey::incoming("other:1");
        let mut asking_rx = connect_fake(&manager, asking.clone()).await;
        let mut other_rx = connect_fake(&manager, other).await;

        manager.handle_message(&asking, PeerMessage::RequestSync).await;

        assert!(matches!(asking_rx.recv().await, Some(PeerMessage::CacheSync(_))));
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_force_sync_sends_snapshot() {
        let manager = manager();
        manager.cache().write().await.set("k".into(), json!("v")).unwrap();
        let mut rx = connect_fake(&manager, PeerKey::incoming("peer:1")).await;

        assert_eq!(manager.force_sync().await, 1);
        match rx.recv().await {
            Some(PeerMessage::CacheSync(sync)) => assert_eq!(sync.entries[0].value, json!("v")),
            other => panic!("expected cache-sync, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_detach_notifies_and_updates_metrics() {
        let manager = manager();
        let key = PeerKey::incoming("peer:1");
        let _rx = connect_fake(&manager, key.clone()).await;
        let mut notes = manager.subscribe();

        let metrics = manager.metrics().await;
        assert_eq!(metrics.connected_peers, 1);
        assert!(metrics.replication_enabled);

        manager.detach(&key).await;
        match notes.recv().await.unwrap() {
            Notification::NodeListUpdate {
                peers, total_count, ..
            } => {
                assert!(peers.is_empty());
                assert_eq!(total_count, 1);
            }
            other => panic!("unexpected notification {other:?}"),
        }
        assert_eq!(manager.metrics().await.connected_peers, 0);
    }

    #[tokio::test]
    async fn test_metrics_track_last_operation() {
        let manager = manager();
        assert_eq!(manager.metrics().await.last_operation_at, None);

        let op = manager.broadcast(OperationKind::Clear).await.unwrap();
        let metrics = manager.metrics().await;
        assert_eq!(metrics.total_operations, 1);
        assert_eq!(metrics.last_operation_at, Some(op.timestamp));
    }
}
