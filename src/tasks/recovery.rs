//! Failure Recovery Task
//!
//! Ends a simulated outage: re-enables replication and pushes a full
//! snapshot so peers catch up on writes made while it was suspended.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::sync::ReplicationManager;

/// Spawns a task that sleeps for `duration`, then re-enables replication and
/// forces a full sync. Abort the handle to cancel the recovery.
pub fn spawn_recovery_task(manager: Arc<ReplicationManager>, duration: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(duration).await;

        manager.set_enabled(true).await;
        let peers = manager.force_sync().await;
        info!(peers, "Recovered from simulated failure");
    })
}
